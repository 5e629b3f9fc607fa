use super::{
    effective_device_count, sample_poisson, sorted_copy, FitableTimestampGenerator, StatefulTimestampGenerator,
    TimestampGenerator,
};
use crate::config::{seeded_rng, TimestampConfig};
use crate::data::LogEntry;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use tracing::info;

/// One Poisson distribution per device over the idle time that follows it.
#[derive(Debug, Clone)]
pub struct PoissonTimestampGenerator {
    base: DateTime<Utc>,
    /// Mean idle time (ms) per device
    means: Vec<f64>,
    epsilon: f64,
    rng: StdRng,
}

impl PoissonTimestampGenerator {
    pub fn new(base: DateTime<Utc>, epsilon: f64, seed: Option<u64>) -> Self {
        Self {
            base,
            means: Vec::new(),
            epsilon,
            rng: seeded_rng(seed),
        }
    }

    pub fn from_config(base: DateTime<Utc>, config: &TimestampConfig) -> Self {
        Self::new(base, config.poisson_epsilon, config.seed)
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }
}

impl TimestampGenerator for PoissonTimestampGenerator {
    fn base_timestamp(&self) -> DateTime<Utc> {
        self.base
    }

    fn set_base_timestamp(&mut self, base: DateTime<Utc>) {
        self.base = base;
    }

    /// Devices unseen at fit time get 0.
    fn generate_length_for_device(&mut self, device: usize) -> i64 {
        match self.means.get(device) {
            Some(&mean) => sample_poisson(&mut self.rng, mean),
            None => 0,
        }
    }
}

impl FitableTimestampGenerator for PoissonTimestampGenerator {
    /// Mean of the gaps following each device, divided by its occurrence count.
    fn fit(&mut self, entries: &[LogEntry], device_count: usize) -> Result<()> {
        let devices = effective_device_count(entries, device_count);
        let entries = sorted_copy(entries);

        let mut occurrences = vec![0usize; devices];
        for e in &entries {
            occurrences[e.device] += 1;
        }
        let mut sums = vec![0.0f64; devices];
        for pair in entries.windows(2) {
            sums[pair[0].device] += pair[0].idle_time_until(&pair[1]) as f64;
        }

        self.means = sums
            .iter()
            .zip(&occurrences)
            .map(|(&sum, &count)| {
                if sum > 0.0 {
                    sum / count.max(1) as f64
                } else {
                    self.epsilon
                }
            })
            .collect();
        info!(devices, entries = entries.len(), "poisson generator fitted");
        Ok(())
    }
}

impl StatefulTimestampGenerator for PoissonTimestampGenerator {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 11, 18, 0, 0, 0).unwrap()
    }

    #[test]
    fn means_per_predecessor_device() {
        // 0 -(60s)-> 1 -(120s)-> 0 -(60s)-> 1
        let entries = vec![
            LogEntry::new(t0(), 0),
            LogEntry::new(t0() + Duration::seconds(60), 1),
            LogEntry::new(t0() + Duration::seconds(180), 0),
            LogEntry::new(t0() + Duration::seconds(240), 1),
        ];
        let mut gen = PoissonTimestampGenerator::new(t0(), 1e-13, Some(1));
        gen.fit(&entries, 3).unwrap();
        assert_eq!(gen.means()[0], 60_000.0);
        assert_eq!(gen.means()[1], 60_000.0);
        assert_eq!(gen.means()[2], 1e-13);
    }

    #[test]
    fn unseen_devices_generate_zero() {
        let mut gen = PoissonTimestampGenerator::new(t0(), 1e-13, Some(1));
        gen.fit(&[LogEntry::new(t0(), 0)], 2).unwrap();
        assert_eq!(gen.generate_length_for_device(1), 0);
        assert_eq!(gen.generate_length_for_device(9), 0);
        assert_eq!(gen.generate_timestamp_for_device(9), t0());
    }

    #[test]
    fn samples_are_near_the_mean() {
        let entries: Vec<LogEntry> = (0..50)
            .map(|i| LogEntry::new(t0() + Duration::minutes(30 * i), 0))
            .collect();
        let mut gen = PoissonTimestampGenerator::new(t0(), 1e-13, Some(7));
        gen.fit(&entries, 1).unwrap();
        let mean = gen.means()[0];
        let sample = gen.generate_length_entries(&entries) as f64;
        assert!((sample - mean).abs() < mean * 0.01);
        // empty history falls back to device 0
        assert!(gen.generate_length_entries(&[]) > 0);
    }
}
