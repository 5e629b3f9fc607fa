//! Label models: predict the next activated device from recent history.
//!
//! - [`MarkovModel`]: episode-wise Markov chain
//! - [`ClusteredMarkovModel`]: k-means clusters, one chain per cluster
//! - [`MockLabelModel`]: constant label 0
//! - external black-box predictors (MLP, LSTM) injected via [`BlackBoxLabelPredictor`]

mod clustered;
mod kmeans;
mod markov;
mod mock;

pub use clustered::{select_k, ClusteredMarkovModel};
pub use kmeans::{nearest_cluster, Cluster, KMeansClusterBuilder};
pub use markov::{MarkovModel, NodeId};
pub use mock::MockLabelModel;

use crate::config::SimulationConfig;
use crate::data::{Log, LogEntry};
use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};

/// Trainable label predictor.
pub trait LabelPredictor {
    /// Train on entries; `device_count` of 0 derives it from the largest label.
    fn fit(&mut self, entries: &[LogEntry], acyclic: bool, device_count: usize) -> Result<()>;

    fn fit_log(&mut self, log: &Log, acyclic: bool) -> Result<()> {
        self.fit(log.entries(), acyclic, log.device_count())
    }

    fn predict_entry(&mut self, entry: &LogEntry) -> usize;

    fn predict_entries(&mut self, entries: &[LogEntry]) -> usize;

    fn predict_log(&mut self, log: &Log) -> usize {
        self.predict_entries(log.entries())
    }
}

/// Label predictor that keeps a cursor between calls.
pub trait StatefulLabelPredictor: LabelPredictor {
    /// `n` labels continuing from `entry`
    fn predict_sequence_from_entry(&mut self, entry: &LogEntry, n: usize) -> Vec<usize>;

    /// `n` labels continuing from a history
    fn predict_sequence(&mut self, entries: &[LogEntry], n: usize) -> Vec<usize>;

    fn predict_sequence_log(&mut self, log: &Log, n: usize) -> Vec<usize> {
        self.predict_sequence(log.entries(), n)
    }

    fn reset_predictions(&mut self);
}

/// Externally implemented learned predictor (neural network or similar).
pub trait BlackBoxLabelPredictor: Send {
    fn fit(&mut self, entries: &[LogEntry], device_count: usize) -> Result<()>;

    /// Next label given the history, most recent entry last
    fn predict(&mut self, history: &[LogEntry]) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelModelKind {
    Mock,
    Markov,
    ClusteredMarkov,
    Mlp,
    Lstm,
}

impl LabelModelKind {
    /// Mock output carries no information worth scoring.
    pub fn is_evaluable(self) -> bool {
        !matches!(self, LabelModelKind::Mock)
    }

    pub fn name(self) -> &'static str {
        match self {
            LabelModelKind::Mock => "noModel",
            LabelModelKind::Markov => "BasicMarkov",
            LabelModelKind::ClusteredMarkov => "ClusteredMarkov",
            LabelModelKind::Mlp => "MLP",
            LabelModelKind::Lstm => "LSTM",
        }
    }

    pub fn is_external(self) -> bool {
        matches!(self, LabelModelKind::Mlp | LabelModelKind::Lstm)
    }
}

impl std::fmt::Display for LabelModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Closed set of label models, dispatched by variant.
pub enum LabelModel {
    Mock(MockLabelModel),
    Markov(MarkovModel),
    ClusteredMarkov(ClusteredMarkovModel),
    External {
        kind: LabelModelKind,
        predictor: Box<dyn BlackBoxLabelPredictor>,
        history: Vec<LogEntry>,
    },
}

impl LabelModel {
    /// Build a built-in model. Black-box kinds need [`LabelModel::external`].
    pub fn from_kind(kind: LabelModelKind, config: &SimulationConfig) -> Result<Self> {
        match kind {
            LabelModelKind::Mock => Ok(LabelModel::Mock(MockLabelModel)),
            LabelModelKind::Markov => Ok(LabelModel::Markov(MarkovModel::new(config.markov.clone()))),
            LabelModelKind::ClusteredMarkov => Ok(LabelModel::ClusteredMarkov(ClusteredMarkovModel::new(
                config.clustering.clone(),
                config.markov.clone(),
            ))),
            LabelModelKind::Mlp | LabelModelKind::Lstm => Err(SimError::ModelUnavailable(kind.name().to_string())),
        }
    }

    pub fn external(kind: LabelModelKind, predictor: Box<dyn BlackBoxLabelPredictor>) -> Result<Self> {
        if !kind.is_external() {
            return Err(SimError::InvalidParameter(format!("{kind} is not a black-box model kind")));
        }
        Ok(LabelModel::External {
            kind,
            predictor,
            history: Vec::new(),
        })
    }

    pub fn kind(&self) -> LabelModelKind {
        match self {
            LabelModel::Mock(_) => LabelModelKind::Mock,
            LabelModel::Markov(_) => LabelModelKind::Markov,
            LabelModel::ClusteredMarkov(_) => LabelModelKind::ClusteredMarkov,
            LabelModel::External { kind, .. } => *kind,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }
}

impl std::fmt::Debug for LabelModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelModel").field("kind", &self.kind()).finish()
    }
}

/// Feed a black-box predictor its own output as continuing history.
fn external_sequence(
    predictor: &mut dyn BlackBoxLabelPredictor,
    history: &mut Vec<LogEntry>,
    n: usize,
) -> Vec<usize> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let label = predictor.predict(history);
        out.push(label);
        if let Some(last) = history.last() {
            let next = LogEntry::new(last.timestamp, label);
            history.push(next);
        }
    }
    out
}

impl LabelPredictor for LabelModel {
    fn fit(&mut self, entries: &[LogEntry], acyclic: bool, device_count: usize) -> Result<()> {
        match self {
            LabelModel::Mock(m) => m.fit(entries, acyclic, device_count),
            LabelModel::Markov(m) => m.fit(entries, acyclic, device_count),
            LabelModel::ClusteredMarkov(m) => m.fit(entries, acyclic, device_count),
            LabelModel::External { predictor, history, .. } => {
                history.clear();
                predictor.fit(entries, device_count)
            }
        }
    }

    fn predict_entry(&mut self, entry: &LogEntry) -> usize {
        match self {
            LabelModel::Mock(m) => m.predict_entry(entry),
            LabelModel::Markov(m) => m.predict_entry(entry),
            LabelModel::ClusteredMarkov(m) => m.predict_entry(entry),
            LabelModel::External { predictor, .. } => predictor.predict(std::slice::from_ref(entry)),
        }
    }

    fn predict_entries(&mut self, entries: &[LogEntry]) -> usize {
        match self {
            LabelModel::Mock(m) => m.predict_entries(entries),
            LabelModel::Markov(m) => m.predict_entries(entries),
            LabelModel::ClusteredMarkov(m) => m.predict_entries(entries),
            LabelModel::External { predictor, .. } => predictor.predict(entries),
        }
    }
}

impl StatefulLabelPredictor for LabelModel {
    fn predict_sequence_from_entry(&mut self, entry: &LogEntry, n: usize) -> Vec<usize> {
        match self {
            LabelModel::Mock(m) => m.predict_sequence_from_entry(entry, n),
            LabelModel::Markov(m) => m.predict_sequence_from_entry(entry, n),
            LabelModel::ClusteredMarkov(m) => m.predict_sequence_from_entry(entry, n),
            LabelModel::External { predictor, history, .. } => {
                history.clear();
                history.push(entry.clone());
                external_sequence(predictor.as_mut(), history, n)
            }
        }
    }

    fn predict_sequence(&mut self, entries: &[LogEntry], n: usize) -> Vec<usize> {
        match self {
            LabelModel::Mock(m) => m.predict_sequence(entries, n),
            LabelModel::Markov(m) => m.predict_sequence(entries, n),
            LabelModel::ClusteredMarkov(m) => m.predict_sequence(entries, n),
            LabelModel::External { predictor, history, .. } => {
                history.clear();
                history.extend_from_slice(entries);
                external_sequence(predictor.as_mut(), history, n)
            }
        }
    }

    fn reset_predictions(&mut self) {
        match self {
            LabelModel::Mock(m) => m.reset_predictions(),
            LabelModel::Markov(m) => m.reset_predictions(),
            LabelModel::ClusteredMarkov(m) => m.reset_predictions(),
            LabelModel::External { history, .. } => history.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    struct Repeat;

    impl BlackBoxLabelPredictor for Repeat {
        fn fit(&mut self, _entries: &[LogEntry], _device_count: usize) -> Result<()> {
            Ok(())
        }

        fn predict(&mut self, history: &[LogEntry]) -> usize {
            history.last().map(|e| e.device + 1).unwrap_or(0)
        }
    }

    #[test]
    fn black_box_kinds_need_injection() {
        let cfg = SimulationConfig::default();
        assert!(matches!(
            LabelModel::from_kind(LabelModelKind::Lstm, &cfg),
            Err(SimError::ModelUnavailable(_))
        ));
        assert!(LabelModel::external(LabelModelKind::Markov, Box::new(Repeat)).is_err());
    }

    #[test]
    fn external_sequence_feeds_back_predictions() {
        let mut model = LabelModel::external(LabelModelKind::Mlp, Box::new(Repeat)).unwrap();
        let e = LogEntry::new(Utc.with_ymd_and_hms(2019, 11, 18, 0, 0, 0).unwrap(), 2);
        assert_eq!(model.predict_sequence_from_entry(&e, 3), vec![3, 4, 5]);
        assert_eq!(model.name(), "MLP");
    }

    #[test]
    fn kinds_and_names() {
        assert!(!LabelModelKind::Mock.is_evaluable());
        assert!(LabelModelKind::ClusteredMarkov.is_evaluable());
        assert_eq!(LabelModelKind::Markov.to_string(), "BasicMarkov");
        let cfg = SimulationConfig::default();
        let model = LabelModel::from_kind(LabelModelKind::ClusteredMarkov, &cfg).unwrap();
        assert_eq!(model.kind(), LabelModelKind::ClusteredMarkov);
    }

    #[test]
    fn mock_always_predicts_zero() {
        let mut model = LabelModel::from_kind(LabelModelKind::Mock, &SimulationConfig::default()).unwrap();
        let e = LogEntry::new(Utc.with_ymd_and_hms(2019, 11, 18, 0, 0, 0).unwrap(), 4);
        model.fit(&[e.clone()], false, 5).unwrap();
        assert_eq!(model.predict_entry(&e), 0);
        assert_eq!(model.predict_sequence(&[e], 2), vec![0, 0]);
    }
}
