//! presence-sim: synthetic smart-home presence logs.
//!
//! Modular structure:
//! - [`data`]: Log entries, device mapping, weather, splits, synthetic logs
//! - [`features`]: Feature vectors and scaling
//! - [`model`]: Label models (Markov, clustered Markov)
//! - [`timestamps`]: Idle-time generators
//! - [`evaluation`]: Alignment similarity and timestamp statistics
//! - [`simulation`]: Continuation of a fitted log
//! - [`logging`]: Structured JSON logging

pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod logging;
pub mod model;
pub mod simulation;
pub mod timestamps;

pub use config::SimulationConfig;
pub use data::{Log, LogEntry, RandomLogGenerator};
pub use error::{Result, SimError};
pub use evaluation::{evaluate_runs, EvaluationDataGenerator, EvaluationReport};
pub use logging::StructuredLogger;
pub use model::{LabelModel, LabelModelKind};
pub use simulation::{SimulatedEvent, Simulator};
pub use timestamps::{TimestampModel, TimestampModelKind};
