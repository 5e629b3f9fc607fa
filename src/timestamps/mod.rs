//! Timestamp models: how long until the next event of a device.
//!
//! Every generator carries a running base timestamp. Each generated duration is
//! added onto it, so `generate_timestamp*` advances the cursor on every call.
//!
//! - [`UniformTimestampGenerator`]: uniform in `[0, upper]`
//! - [`PoissonTimestampGenerator`]: one Poisson distribution per device
//! - [`ClassBasedPoissonTimestampGenerator`]: per-device idle time classes
//! - [`TimeFrameTimestampGenerator`]: Poisson per (time of day, device) with core activity frames
//! - [`MockTimestampGenerator`]: zero lengths
//! - external black-box predictors injected via [`BlackBoxTimestampPredictor`]

mod class_poisson;
mod mock;
mod poisson;
mod time_frame;
mod uniform;

pub use class_poisson::{determine_classes, ClassBasedPoissonTimestampGenerator};
pub use mock::MockTimestampGenerator;
pub use poisson::PoissonTimestampGenerator;
pub use time_frame::{time_frame_of, TimeFrameTimestampGenerator};
pub use uniform::UniformTimestampGenerator;

use crate::config::TimestampConfig;
use crate::data::{Log, LogEntry};
use crate::error::{Result, SimError};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand_distr::{Distribution, Poisson};
use serde::{Deserialize, Serialize};

/// One draw from Poisson(`mean`) in milliseconds. Non-positive or non-finite means give 0.
pub(crate) fn sample_poisson<R: Rng + ?Sized>(rng: &mut R, mean: f64) -> i64 {
    if !mean.is_finite() || mean <= 0.0 {
        return 0;
    }
    match Poisson::<f64>::new(mean) {
        Ok(dist) => dist.sample(rng) as i64,
        Err(_) => 0,
    }
}

/// Device count covering both the declared count and every label in `entries`.
pub(crate) fn effective_device_count(entries: &[LogEntry], device_count: usize) -> usize {
    let derived = entries.iter().map(|e| e.device + 1).max().unwrap_or(0);
    device_count.max(derived)
}

pub(crate) fn sorted_copy(entries: &[LogEntry]) -> Vec<LogEntry> {
    let mut sorted = entries.to_vec();
    sorted.sort_by_key(|e| e.timestamp);
    sorted
}

pub trait TimestampGenerator {
    fn base_timestamp(&self) -> DateTime<Utc>;

    fn set_base_timestamp(&mut self, base: DateTime<Utc>);

    /// Idle time in milliseconds before the next event of `device`
    fn generate_length_for_device(&mut self, device: usize) -> i64;

    /// Device used when a history is empty
    fn fallback_device(&self) -> usize {
        0
    }

    fn generate_length(&mut self, entry: &LogEntry) -> i64 {
        self.generate_length_for_device(entry.device)
    }

    fn generate_length_entries(&mut self, entries: &[LogEntry]) -> i64 {
        match entries.last() {
            Some(last) => self.generate_length(last),
            None => {
                let device = self.fallback_device();
                self.generate_length_for_device(device)
            }
        }
    }

    fn generate_length_log(&mut self, log: &Log) -> i64 {
        self.generate_length_entries(log.entries())
    }

    /// Move the base timestamp forward by `ms` and return the new base.
    fn advance(&mut self, ms: i64) -> DateTime<Utc> {
        let next = self.base_timestamp() + Duration::milliseconds(ms);
        self.set_base_timestamp(next);
        next
    }

    fn generate_timestamp_for_device(&mut self, device: usize) -> DateTime<Utc> {
        let ms = self.generate_length_for_device(device);
        self.advance(ms)
    }

    fn generate_timestamp(&mut self, entry: &LogEntry) -> DateTime<Utc> {
        self.generate_timestamp_for_device(entry.device)
    }

    fn generate_timestamp_entries(&mut self, entries: &[LogEntry]) -> DateTime<Utc> {
        let device = entries.last().map(|e| e.device).unwrap_or_else(|| self.fallback_device());
        self.generate_timestamp_for_device(device)
    }

    fn generate_timestamp_log(&mut self, log: &Log) -> DateTime<Utc> {
        self.generate_timestamp_entries(log.entries())
    }
}

pub trait FitableTimestampGenerator: TimestampGenerator {
    /// Train on entries; labels beyond `device_count` widen it.
    fn fit(&mut self, entries: &[LogEntry], device_count: usize) -> Result<()>;

    fn fit_log(&mut self, log: &Log) -> Result<()> {
        self.fit(log.entries(), log.device_count())
    }
}

/// Batch generation over label lists. Each element advances the base timestamp.
pub trait StatefulTimestampGenerator: TimestampGenerator {
    fn generate_length_sequence(&mut self, labels: &[usize]) -> Vec<i64> {
        labels.iter().map(|&d| self.generate_length_for_device(d)).collect()
    }

    fn generate_length_sequence_entries(&mut self, entries: &[LogEntry]) -> Vec<i64> {
        entries.iter().map(|e| self.generate_length(e)).collect()
    }

    fn generate_length_sequence_log(&mut self, log: &Log) -> Vec<i64> {
        self.generate_length_sequence_entries(log.entries())
    }

    fn generate_timestamp_sequence(&mut self, labels: &[usize]) -> Vec<DateTime<Utc>> {
        labels.iter().map(|&d| self.generate_timestamp_for_device(d)).collect()
    }

    fn generate_timestamp_sequence_entries(&mut self, entries: &[LogEntry]) -> Vec<DateTime<Utc>> {
        entries.iter().map(|e| self.generate_timestamp(e)).collect()
    }

    fn generate_timestamp_sequence_log(&mut self, log: &Log) -> Vec<DateTime<Utc>> {
        self.generate_timestamp_sequence_entries(log.entries())
    }
}

/// Externally implemented learned timestamp model.
pub trait BlackBoxTimestampPredictor: Send {
    fn fit(&mut self, entries: &[LogEntry], device_count: usize) -> Result<()>;

    /// Idle time in ms after the last entry of `history`
    fn predict_length(&mut self, history: &[LogEntry]) -> i64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampModelKind {
    Mock,
    Uniform,
    Poisson,
    ClassBasedPoisson,
    TimeFrame,
    Lstm,
}

impl TimestampModelKind {
    pub fn is_evaluable(self) -> bool {
        !matches!(self, TimestampModelKind::Mock)
    }

    pub fn name(self) -> &'static str {
        match self {
            TimestampModelKind::Mock => "noGenerator",
            TimestampModelKind::Uniform => "UniformGenerator",
            TimestampModelKind::Poisson => "PoissonGenerator",
            TimestampModelKind::ClassBasedPoisson => "ClassBasedPoissonGenerator",
            TimestampModelKind::TimeFrame => "TimeFrameGenerator",
            TimestampModelKind::Lstm => "LSTMGenerator",
        }
    }

    pub fn is_external(self) -> bool {
        matches!(self, TimestampModelKind::Lstm)
    }
}

impl std::fmt::Display for TimestampModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Closed set of timestamp models, dispatched by variant.
pub enum TimestampModel {
    Mock(MockTimestampGenerator),
    Uniform(UniformTimestampGenerator),
    Poisson(PoissonTimestampGenerator),
    ClassBasedPoisson(ClassBasedPoissonTimestampGenerator),
    TimeFrame(TimeFrameTimestampGenerator),
    External {
        kind: TimestampModelKind,
        predictor: Box<dyn BlackBoxTimestampPredictor>,
        base: DateTime<Utc>,
    },
}

impl TimestampModel {
    /// Build a built-in generator starting at `base`. Black-box kinds need [`TimestampModel::external`].
    pub fn from_kind(kind: TimestampModelKind, base: DateTime<Utc>, config: &TimestampConfig) -> Result<Self> {
        Ok(match kind {
            TimestampModelKind::Mock => TimestampModel::Mock(MockTimestampGenerator::new(base)),
            TimestampModelKind::Uniform => TimestampModel::Uniform(UniformTimestampGenerator::from_config(base, config)),
            TimestampModelKind::Poisson => TimestampModel::Poisson(PoissonTimestampGenerator::from_config(base, config)),
            TimestampModelKind::ClassBasedPoisson => {
                TimestampModel::ClassBasedPoisson(ClassBasedPoissonTimestampGenerator::from_config(base, config))
            }
            TimestampModelKind::TimeFrame => {
                TimestampModel::TimeFrame(TimeFrameTimestampGenerator::from_config(base, config)?)
            }
            TimestampModelKind::Lstm => return Err(SimError::ModelUnavailable(kind.name().to_string())),
        })
    }

    pub fn external(
        kind: TimestampModelKind,
        predictor: Box<dyn BlackBoxTimestampPredictor>,
        base: DateTime<Utc>,
    ) -> Result<Self> {
        if !kind.is_external() {
            return Err(SimError::InvalidParameter(format!("{kind} is not a black-box model kind")));
        }
        Ok(TimestampModel::External { kind, predictor, base })
    }

    pub fn kind(&self) -> TimestampModelKind {
        match self {
            TimestampModel::Mock(_) => TimestampModelKind::Mock,
            TimestampModel::Uniform(_) => TimestampModelKind::Uniform,
            TimestampModel::Poisson(_) => TimestampModelKind::Poisson,
            TimestampModel::ClassBasedPoisson(_) => TimestampModelKind::ClassBasedPoisson,
            TimestampModel::TimeFrame(_) => TimestampModelKind::TimeFrame,
            TimestampModel::External { kind, .. } => *kind,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }
}

impl std::fmt::Debug for TimestampModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimestampModel")
            .field("kind", &self.kind())
            .field("base", &self.base_timestamp())
            .finish()
    }
}

impl TimestampGenerator for TimestampModel {
    fn base_timestamp(&self) -> DateTime<Utc> {
        match self {
            TimestampModel::Mock(g) => g.base_timestamp(),
            TimestampModel::Uniform(g) => g.base_timestamp(),
            TimestampModel::Poisson(g) => g.base_timestamp(),
            TimestampModel::ClassBasedPoisson(g) => g.base_timestamp(),
            TimestampModel::TimeFrame(g) => g.base_timestamp(),
            TimestampModel::External { base, .. } => *base,
        }
    }

    fn set_base_timestamp(&mut self, new_base: DateTime<Utc>) {
        match self {
            TimestampModel::Mock(g) => g.set_base_timestamp(new_base),
            TimestampModel::Uniform(g) => g.set_base_timestamp(new_base),
            TimestampModel::Poisson(g) => g.set_base_timestamp(new_base),
            TimestampModel::ClassBasedPoisson(g) => g.set_base_timestamp(new_base),
            TimestampModel::TimeFrame(g) => g.set_base_timestamp(new_base),
            TimestampModel::External { base, .. } => *base = new_base,
        }
    }

    fn generate_length_for_device(&mut self, device: usize) -> i64 {
        match self {
            TimestampModel::Mock(g) => g.generate_length_for_device(device),
            TimestampModel::Uniform(g) => g.generate_length_for_device(device),
            TimestampModel::Poisson(g) => g.generate_length_for_device(device),
            TimestampModel::ClassBasedPoisson(g) => g.generate_length_for_device(device),
            TimestampModel::TimeFrame(g) => g.generate_length_for_device(device),
            TimestampModel::External { predictor, base, .. } => {
                predictor.predict_length(&[LogEntry::new(*base, device)])
            }
        }
    }

    fn fallback_device(&self) -> usize {
        match self {
            TimestampModel::TimeFrame(g) => g.fallback_device(),
            _ => 0,
        }
    }

    fn generate_length_entries(&mut self, entries: &[LogEntry]) -> i64 {
        match self {
            TimestampModel::External { predictor, .. } if !entries.is_empty() => predictor.predict_length(entries),
            _ => match entries.last() {
                Some(last) => self.generate_length(last),
                None => {
                    let device = self.fallback_device();
                    self.generate_length_for_device(device)
                }
            },
        }
    }

    fn generate_timestamp_for_device(&mut self, device: usize) -> DateTime<Utc> {
        match self {
            TimestampModel::Mock(g) => g.generate_timestamp_for_device(device),
            _ => {
                let ms = self.generate_length_for_device(device);
                self.advance(ms)
            }
        }
    }

    fn generate_timestamp_entries(&mut self, entries: &[LogEntry]) -> DateTime<Utc> {
        match self {
            TimestampModel::Mock(g) => g.generate_timestamp_entries(entries),
            _ => {
                let ms = self.generate_length_entries(entries);
                self.advance(ms)
            }
        }
    }
}

impl FitableTimestampGenerator for TimestampModel {
    fn fit(&mut self, entries: &[LogEntry], device_count: usize) -> Result<()> {
        match self {
            TimestampModel::Mock(_) | TimestampModel::Uniform(_) => Ok(()),
            TimestampModel::Poisson(g) => g.fit(entries, device_count),
            TimestampModel::ClassBasedPoisson(g) => g.fit(entries, device_count),
            TimestampModel::TimeFrame(g) => g.fit(entries, device_count),
            TimestampModel::External { predictor, .. } => predictor.fit(entries, device_count),
        }
    }
}

impl StatefulTimestampGenerator for TimestampModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 11, 18, 8, 0, 0).unwrap()
    }

    struct FixedGap(i64);

    impl BlackBoxTimestampPredictor for FixedGap {
        fn fit(&mut self, _entries: &[LogEntry], _device_count: usize) -> Result<()> {
            Ok(())
        }

        fn predict_length(&mut self, history: &[LogEntry]) -> i64 {
            self.0 * history.len() as i64
        }
    }

    #[test]
    fn kinds_and_names() {
        assert!(!TimestampModelKind::Mock.is_evaluable());
        assert!(TimestampModelKind::TimeFrame.is_evaluable());
        assert_eq!(TimestampModelKind::ClassBasedPoisson.to_string(), "ClassBasedPoissonGenerator");
        assert_eq!(TimestampModelKind::Mock.name(), "noGenerator");
        let cfg = TimestampConfig::default();
        assert!(matches!(
            TimestampModel::from_kind(TimestampModelKind::Lstm, base(), &cfg),
            Err(SimError::ModelUnavailable(_))
        ));
        let model = TimestampModel::from_kind(TimestampModelKind::Poisson, base(), &cfg).unwrap();
        assert_eq!(model.kind(), TimestampModelKind::Poisson);
    }

    #[test]
    fn generation_advances_the_base() {
        let cfg = TimestampConfig {
            uniform_upper_border_ms: 1000,
            ..TimestampConfig::default()
        };
        let mut model = TimestampModel::from_kind(TimestampModelKind::Uniform, base(), &cfg).unwrap();
        let first = model.generate_timestamp_for_device(0);
        let second = model.generate_timestamp_for_device(0);
        assert!(first >= base());
        assert!(second >= first);
        assert_eq!(model.base_timestamp(), second);
    }

    #[test]
    fn mock_does_not_advance() {
        let mut model = TimestampModel::from_kind(TimestampModelKind::Mock, base(), &TimestampConfig::default()).unwrap();
        let e = LogEntry::new(base(), 3);
        assert_eq!(model.generate_length(&e), 0);
        assert_eq!(model.generate_timestamp(&e), base() + Duration::seconds(1));
        assert_eq!(model.generate_timestamp_entries(&[]), base() + Duration::seconds(1));
        assert_eq!(model.base_timestamp(), base());
    }

    #[test]
    fn external_sees_whole_history() {
        let mut model = TimestampModel::external(TimestampModelKind::Lstm, Box::new(FixedGap(10)), base()).unwrap();
        let history = vec![LogEntry::new(base(), 0), LogEntry::new(base(), 1)];
        assert_eq!(model.generate_length_entries(&history), 20);
        assert_eq!(model.generate_timestamp_entries(&history), base() + Duration::milliseconds(20));
        assert_eq!(model.generate_length_for_device(4), 10);
        assert!(TimestampModel::external(TimestampModelKind::Poisson, Box::new(FixedGap(1)), base()).is_err());
    }

    #[test]
    fn poisson_sample_handles_degenerate_means() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sample_poisson(&mut rng, 0.0), 0);
        assert_eq!(sample_poisson(&mut rng, -3.0), 0);
        assert_eq!(sample_poisson(&mut rng, f64::NAN), 0);
        assert_eq!(sample_poisson(&mut rng, 1e-13), 0);
        let large = sample_poisson(&mut rng, 3_600_000.0);
        assert!((3_500_000..3_700_000).contains(&large));
    }

    #[test]
    fn sequences_follow_labels() {
        let mut model = TimestampModel::from_kind(TimestampModelKind::Uniform, base(), &TimestampConfig::default()).unwrap();
        let lengths = model.generate_length_sequence(&[0, 1, 2]);
        assert_eq!(lengths.len(), 3);
        let stamps = model.generate_timestamp_sequence(&[0, 1]);
        assert!(stamps[0] <= stamps[1]);
    }
}
