use super::{StatefulTimestampGenerator, TimestampGenerator};
use crate::config::{seeded_rng, TimestampConfig};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::Rng;

/// Idle times drawn uniformly from `[0, upper_border_ms]`, ignoring the device.
#[derive(Debug, Clone)]
pub struct UniformTimestampGenerator {
    base: DateTime<Utc>,
    upper_border_ms: i64,
    rng: StdRng,
}

impl UniformTimestampGenerator {
    pub fn new(base: DateTime<Utc>, upper_border_ms: i64, seed: Option<u64>) -> Self {
        Self {
            base,
            upper_border_ms: upper_border_ms.max(0),
            rng: seeded_rng(seed),
        }
    }

    pub fn from_config(base: DateTime<Utc>, config: &TimestampConfig) -> Self {
        Self::new(base, config.uniform_upper_border_ms, config.seed)
    }

    pub fn upper_border_ms(&self) -> i64 {
        self.upper_border_ms
    }
}

impl TimestampGenerator for UniformTimestampGenerator {
    fn base_timestamp(&self) -> DateTime<Utc> {
        self.base
    }

    fn set_base_timestamp(&mut self, base: DateTime<Utc>) {
        self.base = base;
    }

    fn generate_length_for_device(&mut self, _device: usize) -> i64 {
        self.rng.gen_range(0..=self.upper_border_ms)
    }
}

impl StatefulTimestampGenerator for UniformTimestampGenerator {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::LogEntry;
    use chrono::TimeZone;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 11, 18, 0, 0, 0).unwrap()
    }

    #[test]
    fn zero_border_returns_base() {
        let mut gen = UniformTimestampGenerator::new(base(), 0, Some(1));
        let e = LogEntry::new(base(), 2);
        for _ in 0..10 {
            assert_eq!(gen.generate_timestamp(&e), base());
        }
    }

    #[test]
    fn lengths_stay_within_border() {
        let mut gen = UniformTimestampGenerator::new(base(), 7_200_000, Some(150));
        let lengths = gen.generate_length_sequence(&vec![0; 500]);
        assert!(lengths.iter().all(|l| (0..=7_200_000).contains(l)));
        assert!(lengths.iter().any(|&l| l > 3_600_000));
    }

    #[test]
    fn negative_border_clamps_to_zero() {
        let gen = UniformTimestampGenerator::new(base(), -5, None);
        assert_eq!(gen.upper_border_ms(), 0);
    }
}
