//! Run configuration. Every section has defaults so a missing config file still gives a usable run.

use crate::data::LogKind;
use crate::error::{Result, SimError};
use crate::model::LabelModelKind;
use crate::timestamps::TimestampModelKind;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// What the binary does
    pub mode: RunMode,
    /// Markov label model
    pub markov: MarkovConfig,
    /// k-means used by the clustered Markov model
    pub clustering: ClusteringConfig,
    /// Timestamp generators
    pub timestamps: TimestampConfig,
    /// Evaluation harness
    pub evaluation: EvaluationConfig,
    /// Continuation simulation
    pub simulation: SimulatorConfig,
    /// Fit-time measurement
    pub runtime: RuntimeConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Simulate,
    Evaluate,
    /// Time model fitting on large Zipfian logs
    Runtime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkovConfig {
    /// Gaps of at least this length (ms) start a new episode
    pub episode_gap_ms: i64,
    /// Skip transitions that repeat the preceding device
    pub acyclic: bool,
    /// `None` seeds from entropy
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub k_min: usize,
    pub k_max: usize,
    /// Iteration cap for a single k-means run
    pub iterations: usize,
    /// Independent k-means runs per k, best one kept
    pub attempts: usize,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestampConfig {
    pub uniform_upper_border_ms: i64,
    /// Class means above this (ms) are dropped
    pub class_threshold_ms: f64,
    /// Hours per day partition; must divide 24
    pub time_frame_length_hours: u32,
    /// Fraction of timeframes treated as core activity
    pub core_split_ratio: f64,
    /// Ceiling (ms) for time-frame samples
    pub time_frame_threshold_ms: f64,
    /// Poisson mean used for devices without observations
    pub poisson_epsilon: f64,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub split_ratio: f64,
    pub gap_cost: f64,
    /// Synthetic logs generated per log kind
    pub number_of_logs: usize,
    pub few_devices: usize,
    pub many_devices: usize,
    pub small_events: usize,
    pub large_events: usize,
    pub max_waiting_time_ms: i64,
    pub log_kinds: Vec<LogKind>,
    pub label_models: Vec<LabelModelKind>,
    pub timestamp_models: Vec<TimestampModelKind>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub label_model: LabelModelKind,
    pub timestamp_model: TimestampModelKind,
    pub number_of_events: usize,
    /// When set, generate until this instant instead of a fixed count
    pub until: Option<DateTime<Utc>>,
    /// Sliding window of test entries fed to the label model
    pub window: usize,
    /// Log kind synthesised as training input for the binary
    pub source_log: LogKind,
}

/// Fit timing runs over the evaluation model lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Fresh log and fresh model per iteration
    pub iterations: usize,
    pub devices: usize,
    pub events: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Evaluate,
            markov: MarkovConfig::default(),
            clustering: ClusteringConfig::default(),
            timestamps: TimestampConfig::default(),
            evaluation: EvaluationConfig::default(),
            simulation: SimulatorConfig::default(),
            runtime: RuntimeConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for MarkovConfig {
    fn default() -> Self {
        Self {
            episode_gap_ms: 2 * 60 * 60 * 1000,
            acyclic: false,
            seed: Some(150),
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            k_min: 8,
            k_max: 8,
            iterations: 1000,
            attempts: 1,
            seed: Some(150),
        }
    }
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            uniform_upper_border_ms: 7_200_000,
            class_threshold_ms: 60.0 * 60.0 * 1000.0,
            time_frame_length_hours: 2,
            core_split_ratio: 0.5,
            time_frame_threshold_ms: 1.5 * 60.0 * 60.0 * 1000.0,
            poisson_epsilon: 1e-13,
            seed: Some(150),
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            split_ratio: 0.8,
            gap_cost: 0.5,
            number_of_logs: 1,
            few_devices: 30,
            many_devices: 150,
            small_events: 3000,
            large_events: 15000,
            max_waiting_time_ms: 7_200_000,
            log_kinds: vec![
                LogKind::SmallFewUniform,
                LogKind::SmallManyUniform,
                LogKind::LargeFewUniform,
                LogKind::LargeManyUniform,
                LogKind::FewZipfian,
                LogKind::ManyZipfian,
            ],
            label_models: vec![LabelModelKind::Markov, LabelModelKind::ClusteredMarkov],
            timestamp_models: vec![
                TimestampModelKind::Uniform,
                TimestampModelKind::Poisson,
                TimestampModelKind::ClassBasedPoisson,
                TimestampModelKind::TimeFrame,
            ],
            seed: Some(0),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            label_model: LabelModelKind::Markov,
            timestamp_model: TimestampModelKind::TimeFrame,
            number_of_events: 100,
            until: None,
            window: 10,
            source_log: LogKind::SmallFewUniform,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            devices: 150,
            events: 15000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

/// `Some(seed)` gives a reproducible generator, `None` one seeded from entropy.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

impl SimulationConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(c) => c,
            Err(_) => Self::default(),
        }
    }

    pub fn try_load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: SimulationConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let tf = self.timestamps.time_frame_length_hours;
        if tf == 0 || tf > 24 || 24 % tf != 0 {
            return Err(SimError::InvalidParameter(format!(
                "time_frame_length_hours must divide 24, got {tf}"
            )));
        }
        if !(0.0..=1.0).contains(&self.timestamps.core_split_ratio) {
            return Err(SimError::InvalidParameter(format!(
                "core_split_ratio must lie in [0, 1], got {}",
                self.timestamps.core_split_ratio
            )));
        }
        if !(self.evaluation.split_ratio > 0.0 && self.evaluation.split_ratio < 1.0) {
            return Err(SimError::InvalidParameter(format!(
                "split_ratio must lie in (0, 1), got {}",
                self.evaluation.split_ratio
            )));
        }
        if self.clustering.k_min < 1 || self.clustering.k_max < self.clustering.k_min {
            return Err(SimError::IllegalNumberOfClusters {
                requested: self.clustering.k_min,
            });
        }
        if self.runtime.iterations == 0 || self.runtime.events == 0 {
            return Err(SimError::InvalidParameter(
                "runtime iterations and events must be positive".to_string(),
            ));
        }
        if self.timestamps.uniform_upper_border_ms < 0 {
            return Err(SimError::InvalidParameter(
                "uniform_upper_border_ms must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
