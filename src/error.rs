//! Crate-wide error type. Local fallbacks (random start node, default label) never surface here.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("at least one cluster needs to be calculated (requested {requested})")]
    IllegalNumberOfClusters { requested: usize },

    #[error("model is not evaluable: {0}")]
    NotEvaluable(String),

    #[error("model {0} has no predictor attached")]
    ModelUnavailable(String),

    #[error("log contains no entries")]
    EmptyLog,

    #[error("need at least {needed} samples, got {got}")]
    InsufficientSamples { needed: usize, got: usize },

    #[error("sequence lengths differ (synthetic {synthetic}, ground truth {ground_truth})")]
    LengthMismatch { synthetic: usize, ground_truth: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
