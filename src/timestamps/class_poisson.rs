use super::{
    effective_device_count, sample_poisson, sorted_copy, FitableTimestampGenerator, StatefulTimestampGenerator,
    TimestampGenerator,
};
use crate::config::{seeded_rng, TimestampConfig};
use crate::data::LogEntry;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::Rng;
use tracing::info;

/// Class means of a device's idle times.
///
/// `round(sqrt(n))` classes with upper borders `max / n, max / (n - 1), ..., max`.
/// Sorted values fill the classes in order, moving up one class whenever a value
/// exceeds the current border. Means above `threshold` are dropped; when nothing
/// is left the single class mean is `threshold`.
pub fn determine_classes(idle_times: &[f64], threshold: f64) -> Vec<f64> {
    let classes = (idle_times.len() as f64).sqrt().round() as usize;
    let mut means = Vec::new();

    if classes > 0 {
        let max = idle_times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let borders: Vec<f64> = (0..classes).rev().map(|i| max / (i + 1) as f64).collect();
        let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); classes];
        let mut sorted = idle_times.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mut current = 0;
        for value in sorted {
            if value > borders[current] && current + 1 < classes {
                current += 1;
            }
            buckets[current].push(value);
        }

        for bucket in buckets.iter().filter(|b| !b.is_empty()) {
            let mean = bucket.iter().sum::<f64>() / bucket.len() as f64;
            if mean <= threshold {
                means.push(mean);
            }
        }
    }

    if means.is_empty() {
        means.push(threshold);
    }
    means
}

/// Poisson generators per idle time class; each draw picks a class uniformly.
#[derive(Debug, Clone)]
pub struct ClassBasedPoissonTimestampGenerator {
    base: DateTime<Utc>,
    threshold_ms: f64,
    classes: Vec<Vec<f64>>,
    rng: StdRng,
}

impl ClassBasedPoissonTimestampGenerator {
    pub fn new(base: DateTime<Utc>, threshold_ms: f64, seed: Option<u64>) -> Self {
        Self {
            base,
            threshold_ms,
            classes: Vec::new(),
            rng: seeded_rng(seed),
        }
    }

    pub fn from_config(base: DateTime<Utc>, config: &TimestampConfig) -> Self {
        Self::new(base, config.class_threshold_ms, config.seed)
    }

    /// Class means per device
    pub fn classes(&self) -> &[Vec<f64>] {
        &self.classes
    }
}

impl TimestampGenerator for ClassBasedPoissonTimestampGenerator {
    fn base_timestamp(&self) -> DateTime<Utc> {
        self.base
    }

    fn set_base_timestamp(&mut self, base: DateTime<Utc>) {
        self.base = base;
    }

    fn generate_length_for_device(&mut self, device: usize) -> i64 {
        match self.classes.get(device).filter(|c| !c.is_empty()) {
            Some(means) => {
                let mean = means[self.rng.gen_range(0..means.len())];
                sample_poisson(&mut self.rng, mean)
            }
            None => {
                let upper = self.threshold_ms.round() as i64;
                if upper > 0 {
                    self.rng.gen_range(0..upper)
                } else {
                    0
                }
            }
        }
    }
}

impl FitableTimestampGenerator for ClassBasedPoissonTimestampGenerator {
    fn fit(&mut self, entries: &[LogEntry], device_count: usize) -> Result<()> {
        let devices = effective_device_count(entries, device_count);
        let entries = sorted_copy(entries);

        let mut idle_times: Vec<Vec<f64>> = vec![Vec::new(); devices];
        for pair in entries.windows(2) {
            idle_times[pair[0].device].push(pair[0].idle_time_until(&pair[1]) as f64);
        }
        self.classes = idle_times
            .iter()
            .map(|times| determine_classes(times, self.threshold_ms))
            .collect();

        let total: usize = self.classes.iter().map(Vec::len).sum();
        info!(devices, classes = total, "class based poisson generator fitted");
        Ok(())
    }
}

impl StatefulTimestampGenerator for ClassBasedPoissonTimestampGenerator {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const HOUR: f64 = 3_600_000.0;

    #[test]
    fn classes_use_inverse_borders() {
        // four values, two classes with borders [50, 100]
        let means = determine_classes(&[10.0, 40.0, 60.0, 100.0], HOUR);
        assert_eq!(means, vec![25.0, 80.0]);
    }

    #[test]
    fn values_move_up_one_class_at_a_time() {
        // nine values, three classes with borders [30, 45, 90]; 90 skips a border but only moves one class
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 90.0];
        let means = determine_classes(&values, HOUR);
        assert_eq!(means, vec![4.5, 90.0]);
    }

    #[test]
    fn means_above_threshold_are_dropped() {
        assert_eq!(determine_classes(&[2.0 * HOUR], HOUR), vec![HOUR]);
        assert_eq!(determine_classes(&[], HOUR), vec![HOUR]);
        assert_eq!(determine_classes(&[10.0, 3.0 * HOUR, 4.0 * HOUR, 5.0 * HOUR], HOUR), vec![10.0]);
    }

    #[test]
    fn fitted_devices_draw_from_their_classes() {
        let t0 = Utc.with_ymd_and_hms(2019, 11, 18, 0, 0, 0).unwrap();
        let entries: Vec<LogEntry> = (0..20)
            .map(|i| LogEntry::new(t0 + Duration::minutes(10 * i), (i % 2) as usize))
            .collect();
        let mut gen = ClassBasedPoissonTimestampGenerator::new(t0, HOUR, Some(150));
        gen.fit(&entries, 3).unwrap();
        assert_eq!(gen.classes().len(), 3);
        // device 2 never occurs, so it gets the single threshold class
        assert_eq!(gen.classes()[2], vec![HOUR]);
        let sample = gen.generate_length_for_device(0) as f64;
        assert!((sample - 600_000.0).abs() < 10_000.0);
    }

    #[test]
    fn unknown_device_falls_back_to_uniform_below_threshold() {
        let t0 = Utc.with_ymd_and_hms(2019, 11, 18, 0, 0, 0).unwrap();
        let mut gen = ClassBasedPoissonTimestampGenerator::new(t0, HOUR, Some(3));
        for _ in 0..50 {
            let l = gen.generate_length_for_device(4);
            assert!((0..HOUR as i64).contains(&l));
        }
    }
}
