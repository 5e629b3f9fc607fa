use super::alignment::NeedlemanWunsch;
use crate::error::{Result, SimError};
use crate::model::LabelModelKind;
use serde::Serialize;
use std::collections::BTreeMap;

/// `1 - align(result, truth) / len(result)`; 1.0 is a perfect match.
pub fn label_similarity(aligner: &NeedlemanWunsch, result: &[usize], truth: &[usize]) -> Result<f64> {
    if result.is_empty() {
        return Err(SimError::InsufficientSamples { needed: 1, got: 0 });
    }
    Ok(1.0 - aligner.align(result, truth) / result.len() as f64)
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelSummary {
    pub model: String,
    pub log_type: String,
    pub similarities: Vec<f64>,
    pub average: f64,
}

/// Similarities grouped by (model, log type).
#[derive(Debug, Default)]
pub struct LabelEvaluator {
    aligner: NeedlemanWunsch,
    scores: BTreeMap<(String, String), Vec<f64>>,
}

impl LabelEvaluator {
    pub fn new(aligner: NeedlemanWunsch) -> Self {
        Self {
            aligner,
            scores: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, model: LabelModelKind, log_type: &str, result: &[usize], truth: &[usize]) -> Result<f64> {
        let similarity = label_similarity(&self.aligner, result, truth)?;
        self.scores
            .entry((model.name().to_string(), log_type.to_string()))
            .or_default()
            .push(similarity);
        Ok(similarity)
    }

    pub fn summaries(&self) -> Vec<LabelSummary> {
        self.scores
            .iter()
            .map(|((model, log_type), similarities)| LabelSummary {
                model: model.clone(),
                log_type: log_type.clone(),
                average: similarities.iter().sum::<f64>() / similarities.len() as f64,
                similarities: similarities.clone(),
            })
            .collect()
    }
}
