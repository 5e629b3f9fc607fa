//! Structured logging and ndjson result output.

mod format;

pub use format::{OutputRecord, StructuredLogger};
