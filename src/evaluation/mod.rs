//! Scoring synthetic output against ground truth.
//!
//! Labels are compared by global alignment cost, timestamps by the spread of
//! their absolute differences. Results are grouped per model and log type.

mod alignment;
mod harness;
mod label;
pub mod lines;
mod runtime;
mod statistics;
mod timestamp;

pub use alignment::{NeedlemanWunsch, WeightMatrix};
pub use harness::{EvaluationDataGenerator, EvaluationRun};
pub use label::{label_similarity, LabelEvaluator, LabelSummary};
pub use runtime::{RuntimeEvaluator, RuntimeRecord};
pub use statistics::{render_summary_csv, statistics_of, StatisticalValues, StreamingStatistics, SummaryRow, SUMMARY_HEADER};
pub use timestamp::{evaluate_timestamp_series, timestamp_differences, TimestampEvaluator, TimestampSummary};

use crate::error::{Result, SimError};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub labels: Vec<LabelSummary>,
    pub timestamps: Vec<TimestampSummary>,
}

/// Too few samples skip the series; any other error aborts.
fn skip_short<T>(scored: Result<T>, model: &str, run: &EvaluationRun) -> Result<()> {
    match scored {
        Ok(_) => Ok(()),
        Err(SimError::InsufficientSamples { needed, got }) => {
            warn!(
                model,
                log_type = %run.log_type,
                index = run.index,
                needed,
                got,
                "too few samples, run skipped"
            );
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Score every run with the given gap cost. Series too short to score are
/// left out of the report.
pub fn evaluate_runs(runs: &[EvaluationRun], gap_cost: f64) -> Result<EvaluationReport> {
    let mut labels = LabelEvaluator::new(NeedlemanWunsch::new(WeightMatrix::new(gap_cost)));
    let mut timestamps = TimestampEvaluator::new();
    for run in runs {
        let truth_labels = run.truth_labels();
        for (kind, result) in &run.labels {
            skip_short(labels.add(*kind, &run.log_type, result, &truth_labels), kind.name(), run)?;
        }
        let truth_timestamps = run.truth_timestamps();
        for (kind, result) in &run.timestamps {
            skip_short(timestamps.add(*kind, &run.log_type, result, &truth_timestamps), kind.name(), run)?;
        }
    }
    Ok(EvaluationReport {
        labels: labels.summaries(),
        timestamps: timestamps.summaries(),
    })
}
