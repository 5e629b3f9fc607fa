//! Dispersion statistics over decimal samples and min/max summaries across runs.

use crate::error::{Result, SimError};
use rust_decimal::prelude::*;
use serde::Serialize;

pub const SUMMARY_HEADER: &str = "log_type,min_mean,max_mean,min_var,max_var,min_stdDev,max_stdDev,min_stdErr,max_stdErr,min_relStdErr,max_relStdErr";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticalValues {
    pub mean: Decimal,
    /// Sample variance, `n - 1` denominator
    pub variance: Decimal,
    pub std_dev: Decimal,
    /// `std_dev / sqrt(n)`
    pub std_error: Decimal,
    /// `100 * std_error / n`
    pub relative_std_error: Decimal,
}

/// Welford accumulator in decimal arithmetic.
#[derive(Debug, Clone, Default)]
pub struct StreamingStatistics {
    count: u64,
    mean: Decimal,
    m2: Decimal,
}

impl StreamingStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Decimal) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / Decimal::from(self.count);
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn finish(&self) -> Result<StatisticalValues> {
        if self.count < 2 {
            return Err(SimError::InsufficientSamples {
                needed: 2,
                got: self.count as usize,
            });
        }
        let n = Decimal::from(self.count);
        let variance = self.m2 / (n - Decimal::ONE);
        let std_dev = variance.sqrt().unwrap_or(Decimal::ZERO);
        let std_error = match n.sqrt() {
            Some(root) if !root.is_zero() => std_dev / root,
            _ => Decimal::ZERO,
        };
        Ok(StatisticalValues {
            mean: self.mean.normalize(),
            variance: variance.normalize(),
            std_dev: std_dev.normalize(),
            std_error: std_error.normalize(),
            relative_std_error: (Decimal::ONE_HUNDRED * (std_error / n)).normalize(),
        })
    }
}

impl Extend<Decimal> for StreamingStatistics {
    fn extend<I: IntoIterator<Item = Decimal>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

pub fn statistics_of<I: IntoIterator<Item = Decimal>>(values: I) -> Result<StatisticalValues> {
    let mut acc = StreamingStatistics::new();
    acc.extend(values);
    acc.finish()
}

/// Best and worst case of every statistic over the runs of one log type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub log_type: String,
    pub min_mean: Decimal,
    pub max_mean: Decimal,
    pub min_var: Decimal,
    pub max_var: Decimal,
    pub min_std_dev: Decimal,
    pub max_std_dev: Decimal,
    pub min_std_err: Decimal,
    pub max_std_err: Decimal,
    pub min_rel_std_err: Decimal,
    pub max_rel_std_err: Decimal,
}

fn min_max(values: &[StatisticalValues], field: fn(&StatisticalValues) -> Decimal) -> (Decimal, Decimal) {
    let mut iter = values.iter().map(field);
    let first = iter.next().unwrap_or_default();
    iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

impl SummaryRow {
    /// `None` when there are no runs.
    pub fn from_runs(log_type: impl Into<String>, runs: &[StatisticalValues]) -> Option<Self> {
        if runs.is_empty() {
            return None;
        }
        let (min_mean, max_mean) = min_max(runs, |s| s.mean);
        let (min_var, max_var) = min_max(runs, |s| s.variance);
        let (min_std_dev, max_std_dev) = min_max(runs, |s| s.std_dev);
        let (min_std_err, max_std_err) = min_max(runs, |s| s.std_error);
        let (min_rel_std_err, max_rel_std_err) = min_max(runs, |s| s.relative_std_error);
        Some(Self {
            log_type: log_type.into(),
            min_mean,
            max_mean,
            min_var,
            max_var,
            min_std_dev,
            max_std_dev,
            min_std_err,
            max_std_err,
            min_rel_std_err,
            max_rel_std_err,
        })
    }

    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{}",
            self.log_type,
            self.min_mean,
            self.max_mean,
            self.min_var,
            self.max_var,
            self.min_std_dev,
            self.max_std_dev,
            self.min_std_err,
            self.max_std_err,
            self.min_rel_std_err,
            self.max_rel_std_err
        )
    }
}

/// Header plus one line per row, newline terminated.
pub fn render_summary_csv(rows: &[SummaryRow]) -> String {
    let mut out = String::from(SUMMARY_HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(&row.to_csv_row());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn close(a: Decimal, b: Decimal) -> bool {
        (a - b).abs() < dec!(0.000000001)
    }

    #[test]
    fn one_two_three() {
        let s = statistics_of([dec!(1.0), dec!(2.0), dec!(3.0)]).unwrap();
        assert_eq!(s.mean, dec!(2));
        assert_eq!(s.variance, dec!(1));
        assert!(close(s.std_dev, dec!(1)));
        assert!(close(s.std_error, dec!(0.5773502691896257645)));
        assert!(close(s.relative_std_error, dec!(19.24500897298752548)));
    }

    #[test]
    fn streaming_matches_two_pass() {
        let values = [dec!(0.5), dec!(12.25), dec!(3.0), dec!(7.75), dec!(0.0), dec!(100.125)];
        let n = Decimal::from(values.len());
        let mean: Decimal = values.iter().sum::<Decimal>() / n;
        let var: Decimal = values.iter().map(|v| (*v - mean) * (*v - mean)).sum::<Decimal>() / (n - Decimal::ONE);

        let s = statistics_of(values).unwrap();
        assert!(close(s.mean, mean));
        assert!(close(s.variance, var));
    }

    #[test]
    fn too_few_samples() {
        assert!(matches!(
            statistics_of([dec!(4)]),
            Err(SimError::InsufficientSamples { needed: 2, got: 1 })
        ));
        assert!(statistics_of(Vec::<Decimal>::new()).is_err());
    }

    #[test]
    fn summary_reports_min_and_max() {
        let a = statistics_of([dec!(1), dec!(2), dec!(3)]).unwrap();
        let b = statistics_of([dec!(10), dec!(10), dec!(16)]).unwrap();
        let row = SummaryRow::from_runs("smallFewUniformLog", &[a, b]).unwrap();
        assert_eq!(row.min_mean, dec!(2));
        assert_eq!(row.max_mean, dec!(12));
        assert_eq!(row.min_var, dec!(1));
        assert_eq!(row.max_var, dec!(12));
        assert!(SummaryRow::from_runs("x", &[]).is_none());

        let csv = render_summary_csv(&[row]);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(SUMMARY_HEADER));
        let cells: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(cells.len(), 11);
        assert_eq!(cells[0], "smallFewUniformLog");
        assert_eq!(cells[1], "2");
    }
}
