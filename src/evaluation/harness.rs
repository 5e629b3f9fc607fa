//! In-memory evaluation data: fit models on the first part of a log, replay the rest.

use crate::config::SimulationConfig;
use crate::data::{train_test_split, Log, LogKind};
use crate::error::{Result, SimError};
use crate::model::{LabelModel, LabelModelKind, LabelPredictor};
use crate::timestamps::{FitableTimestampGenerator, TimestampGenerator, TimestampModel, TimestampModelKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// Synthetic sequences and ground truth of one log.
///
/// Prediction `i` is made from test entry `i` and scored against test entry
/// `i + 1`: results drop their last element, the ground truth its first.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRun {
    pub log_type: String,
    pub index: usize,
    pub ground_truth: Vec<(DateTime<Utc>, usize)>,
    pub labels: Vec<(LabelModelKind, Vec<usize>)>,
    pub timestamps: Vec<(TimestampModelKind, Vec<DateTime<Utc>>)>,
}

impl EvaluationRun {
    pub fn truth_labels(&self) -> Vec<usize> {
        self.ground_truth.iter().map(|(_, l)| *l).collect()
    }

    pub fn truth_timestamps(&self) -> Vec<DateTime<Utc>> {
        self.ground_truth.iter().map(|(t, _)| *t).collect()
    }
}

fn drop_last<T>(mut values: Vec<T>) -> Vec<T> {
    values.pop();
    values
}

pub struct EvaluationDataGenerator {
    config: SimulationConfig,
}

impl EvaluationDataGenerator {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Evaluate every configured label model and timestamp generator on `log`.
    pub fn generate(&self, log: &Log, log_kind: LogKind, index: usize) -> Result<EvaluationRun> {
        let eval = &self.config.evaluation;
        let labels = eval
            .label_models
            .iter()
            .map(|&k| LabelModel::from_kind(k, &self.config))
            .collect::<Result<Vec<_>>>()?;
        let base = log.first().map(|e| e.timestamp).unwrap_or_default();
        let timestamps = eval
            .timestamp_models
            .iter()
            .map(|&k| TimestampModel::from_kind(k, base, &self.config.timestamps))
            .collect::<Result<Vec<_>>>()?;
        self.generate_with(log, log_kind.name(), index, labels, timestamps)
    }

    /// Evaluate one label model kind and one generator kind. Non-evaluable kinds are
    /// skipped; selecting two of them is an error.
    pub fn evaluate_single(
        &self,
        log: &Log,
        log_kind: LogKind,
        index: usize,
        label_kind: LabelModelKind,
        timestamp_kind: TimestampModelKind,
    ) -> Result<EvaluationRun> {
        if !label_kind.is_evaluable() && !timestamp_kind.is_evaluable() {
            return Err(SimError::NotEvaluable(format!("{label_kind} with {timestamp_kind}")));
        }
        let mut labels = Vec::new();
        if label_kind.is_evaluable() {
            labels.push(LabelModel::from_kind(label_kind, &self.config)?);
        }
        let mut timestamps = Vec::new();
        if timestamp_kind.is_evaluable() {
            let base = log.first().map(|e| e.timestamp).unwrap_or_default();
            timestamps.push(TimestampModel::from_kind(timestamp_kind, base, &self.config.timestamps)?);
        }
        self.generate_with(log, log_kind.name(), index, labels, timestamps)
    }

    /// Evaluate caller-built models, including external ones. Timestamp models are
    /// rebased onto the first test entry before fitting.
    pub fn generate_with(
        &self,
        log: &Log,
        log_type: &str,
        index: usize,
        label_models: Vec<LabelModel>,
        timestamp_models: Vec<TimestampModel>,
    ) -> Result<EvaluationRun> {
        let split = train_test_split(log, self.config.evaluation.split_ratio)?;
        let base = split.test.first().ok_or(SimError::EmptyLog)?.timestamp;
        let acyclic = self.config.markov.acyclic;

        let mut labels = Vec::with_capacity(label_models.len());
        for mut model in label_models {
            model.fit_log(&split.train, acyclic)?;
            let predicted: Vec<usize> = split.test.iter().map(|e| model.predict_entry(e)).collect();
            labels.push((model.kind(), drop_last(predicted)));
        }

        let mut timestamps = Vec::with_capacity(timestamp_models.len());
        for mut generator in timestamp_models {
            generator.set_base_timestamp(base);
            generator.fit_log(&split.train)?;
            let generated: Vec<DateTime<Utc>> = split.test.iter().map(|e| generator.generate_timestamp(e)).collect();
            timestamps.push((generator.kind(), drop_last(generated)));
        }

        info!(
            log_type,
            index,
            train = split.train.len(),
            test = split.test.len(),
            label_models = labels.len(),
            timestamp_models = timestamps.len(),
            "evaluation data generated"
        );

        Ok(EvaluationRun {
            log_type: log_type.to_string(),
            index,
            ground_truth: split.test.iter().skip(1).map(|e| (e.timestamp, e.device)).collect(),
            labels,
            timestamps,
        })
    }
}
