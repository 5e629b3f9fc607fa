use super::statistics::{render_summary_csv, statistics_of, StatisticalValues, SummaryRow};
use crate::error::{Result, SimError};
use crate::timestamps::TimestampModelKind;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Elementwise absolute differences in seconds, exact to the millisecond.
pub fn timestamp_differences(synthetic: &[DateTime<Utc>], ground_truth: &[DateTime<Utc>]) -> Result<Vec<Decimal>> {
    if synthetic.len() != ground_truth.len() {
        return Err(SimError::LengthMismatch {
            synthetic: synthetic.len(),
            ground_truth: ground_truth.len(),
        });
    }
    Ok(synthetic
        .iter()
        .zip(ground_truth)
        .map(|(s, g)| Decimal::new((*s - *g).num_milliseconds().abs(), 3))
        .collect())
}

pub fn evaluate_timestamp_series(
    synthetic: &[DateTime<Utc>],
    ground_truth: &[DateTime<Utc>],
) -> Result<StatisticalValues> {
    statistics_of(timestamp_differences(synthetic, ground_truth)?)
}

#[derive(Debug, Clone, Serialize)]
pub struct TimestampSummary {
    pub model: String,
    pub rows: Vec<SummaryRow>,
}

impl TimestampSummary {
    pub fn to_csv(&self) -> String {
        render_summary_csv(&self.rows)
    }
}

/// Per-run statistics grouped by generator and log type.
#[derive(Debug, Default)]
pub struct TimestampEvaluator {
    runs: BTreeMap<String, BTreeMap<String, Vec<StatisticalValues>>>,
}

impl TimestampEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        model: TimestampModelKind,
        log_type: &str,
        synthetic: &[DateTime<Utc>],
        ground_truth: &[DateTime<Utc>],
    ) -> Result<StatisticalValues> {
        let values = evaluate_timestamp_series(synthetic, ground_truth)?;
        self.runs
            .entry(model.name().to_string())
            .or_default()
            .entry(log_type.to_string())
            .or_default()
            .push(values.clone());
        Ok(values)
    }

    pub fn summaries(&self) -> Vec<TimestampSummary> {
        self.runs
            .iter()
            .map(|(model, by_log)| TimestampSummary {
                model: model.clone(),
                rows: by_log
                    .iter()
                    .filter_map(|(log_type, runs)| SummaryRow::from_runs(log_type.as_str(), runs))
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 11, 18, 0, 0, 0).unwrap()
    }

    #[test]
    fn differences_are_absolute_seconds() {
        let synthetic = vec![t0() + Duration::milliseconds(1500), t0()];
        let truth = vec![t0(), t0() + Duration::seconds(2)];
        assert_eq!(timestamp_differences(&synthetic, &truth).unwrap(), vec![dec!(1.5), dec!(2)]);
    }

    #[test]
    fn unequal_lengths_are_rejected() {
        assert!(matches!(
            timestamp_differences(&[t0()], &[]),
            Err(SimError::LengthMismatch { synthetic: 1, ground_truth: 0 })
        ));
    }

    #[test]
    fn summaries_group_by_generator() {
        let truth = vec![t0(), t0(), t0()];
        let synthetic: Vec<DateTime<Utc>> = (1..=3).map(|s| t0() + Duration::seconds(s)).collect();
        let mut eval = TimestampEvaluator::new();
        let stats = eval
            .add(TimestampModelKind::Poisson, "smallFewUniformLog", &synthetic, &truth)
            .unwrap();
        assert_eq!(stats.mean, dec!(2));
        assert_eq!(stats.variance, dec!(1));
        eval.add(TimestampModelKind::Poisson, "smallFewUniformLog", &truth, &truth)
            .unwrap();

        let summaries = eval.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].model, "PoissonGenerator");
        let row = &summaries[0].rows[0];
        assert_eq!(row.min_mean, dec!(0));
        assert_eq!(row.max_mean, dec!(2));
        assert!(summaries[0].to_csv().starts_with("log_type,min_mean"));
    }
}
