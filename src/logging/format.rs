//! Output lines: one JSON object per line (ndjson), both for tracing and for results.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::io::Write;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// A result line: emission time, record kind, then the payload's own fields.
#[derive(Serialize)]
pub struct OutputRecord<'a, T: Serialize> {
    pub ts: String,
    pub kind: &'a str,
    #[serde(flatten)]
    pub payload: &'a T,
}

impl<'a, T: Serialize> OutputRecord<'a, T> {
    pub fn new(kind: &'a str, payload: &'a T) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            kind,
            payload,
        }
    }
}

pub struct StructuredLogger;

impl StructuredLogger {
    /// Install the global subscriber. Diagnostics go to stderr so stdout carries
    /// only result records; the level comes from RUST_LOG or `default_level`.
    /// Fails if a global subscriber is already installed.
    pub fn init(json: bool, default_level: &str) -> Result<(), TryInitError> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        if json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(fmt).try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()
        }
    }

    /// Write `payload` as one tagged ndjson line.
    pub fn emit_json(kind: &str, payload: &impl Serialize, w: &mut impl Write) -> std::io::Result<()> {
        let line = serde_json::to_string(&OutputRecord::new(kind, payload))?;
        writeln!(w, "{}", line)
    }
}
