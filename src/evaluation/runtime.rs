//! Fit-time measurement: every built-in model is fitted on the train part of
//! fresh Zipfian logs and the wall time of each fit is recorded.

use crate::config::SimulationConfig;
use crate::data::{train_test_split, Log, RandomLogGenerator};
use crate::error::{Result, SimError};
use crate::model::{LabelModel, LabelModelKind, LabelPredictor};
use crate::timestamps::{FitableTimestampGenerator, TimestampModel, TimestampModelKind};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeRecord {
    pub model: String,
    pub runtimes_ms: Vec<f64>,
    pub average_ms: f64,
}

impl RuntimeRecord {
    fn new(model: &str, runtimes_ms: Vec<f64>) -> Self {
        let average_ms = if runtimes_ms.is_empty() {
            0.0
        } else {
            runtimes_ms.iter().sum::<f64>() / runtimes_ms.len() as f64
        };
        Self {
            model: model.to_string(),
            runtimes_ms,
            average_ms,
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

pub struct RuntimeEvaluator {
    config: SimulationConfig,
}

impl RuntimeEvaluator {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Time every built-in kind of the evaluation lists. Mock and black-box
    /// kinds are skipped; nothing left to time is an error.
    pub fn measure(&self) -> Result<Vec<RuntimeRecord>> {
        let labels: Vec<LabelModelKind> = self
            .config
            .evaluation
            .label_models
            .iter()
            .copied()
            .filter(|k| timeable(k.is_evaluable(), k.is_external(), k.name()))
            .collect();
        let timestamps: Vec<TimestampModelKind> = self
            .config
            .evaluation
            .timestamp_models
            .iter()
            .copied()
            .filter(|k| timeable(k.is_evaluable(), k.is_external(), k.name()))
            .collect();
        if labels.is_empty() && timestamps.is_empty() {
            return Err(SimError::NotEvaluable("no built-in model to time".to_string()));
        }

        let mut records = Vec::with_capacity(labels.len() + timestamps.len());
        for kind in labels {
            records.push(self.time_label_model(kind)?);
        }
        for kind in timestamps {
            records.push(self.time_timestamp_model(kind)?);
        }
        Ok(records)
    }

    /// The same log sequence for every model kind.
    fn logs(&self) -> impl Iterator<Item = Log> {
        let rt = &self.config.runtime;
        let (devices, events) = (rt.devices, rt.events);
        let mut generator = RandomLogGenerator::new(self.config.evaluation.seed)
            .with_max_waiting_time(self.config.evaluation.max_waiting_time_ms);
        (0..rt.iterations).map(move |_| generator.zipfian_log(devices, events))
    }

    pub fn time_label_model(&self, kind: LabelModelKind) -> Result<RuntimeRecord> {
        let mut runtimes = Vec::with_capacity(self.config.runtime.iterations);
        for (i, log) in self.logs().enumerate() {
            let split = train_test_split(&log, self.config.evaluation.split_ratio)?;
            let mut model = LabelModel::from_kind(kind, &self.config)?;
            let start = Instant::now();
            model.fit_log(&split.train, self.config.markov.acyclic)?;
            let ms = elapsed_ms(start);
            info!(model = kind.name(), iteration = i + 1, ms, "fit timed");
            runtimes.push(ms);
        }
        Ok(RuntimeRecord::new(kind.name(), runtimes))
    }

    pub fn time_timestamp_model(&self, kind: TimestampModelKind) -> Result<RuntimeRecord> {
        let mut runtimes = Vec::with_capacity(self.config.runtime.iterations);
        for (i, log) in self.logs().enumerate() {
            let split = train_test_split(&log, self.config.evaluation.split_ratio)?;
            let base = split.test.first().ok_or(SimError::EmptyLog)?.timestamp;
            let mut model = TimestampModel::from_kind(kind, base, &self.config.timestamps)?;
            let start = Instant::now();
            model.fit_log(&split.train)?;
            let ms = elapsed_ms(start);
            info!(model = kind.name(), iteration = i + 1, ms, "fit timed");
            runtimes.push(ms);
        }
        Ok(RuntimeRecord::new(kind.name(), runtimes))
    }
}

fn timeable(evaluable: bool, external: bool, name: &str) -> bool {
    if !evaluable || external {
        warn!(model = name, "no built-in fit to time, skipping");
        return false;
    }
    true
}
