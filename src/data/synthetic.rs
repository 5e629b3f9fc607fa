//! Randomly generated logs used as evaluation input.

use super::entry::LogEntry;
use super::log::Log;
use super::weather::WeatherSample;
use crate::config::{seeded_rng, EvaluationConfig};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Category of evaluation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    SmallFewUniform,
    SmallManyUniform,
    LargeFewUniform,
    LargeManyUniform,
    FewZipfian,
    ManyZipfian,
    /// Recorded log supplied by the caller
    Real,
}

impl LogKind {
    /// Stable name used for result grouping and summary rows
    pub fn name(self) -> &'static str {
        match self {
            LogKind::SmallFewUniform => "smallFewUniformLog",
            LogKind::SmallManyUniform => "smallManyUniformLog",
            LogKind::LargeFewUniform => "largeFewUniformLog",
            LogKind::LargeManyUniform => "largeManyUniformLog",
            LogKind::FewZipfian => "fewZipfianLog",
            LogKind::ManyZipfian => "manyZipfianLog",
            LogKind::Real => "realLog",
        }
    }

    /// (devices, events) for the synthetic kinds; `None` for [`LogKind::Real`]
    pub fn dimensions(self, cfg: &EvaluationConfig) -> Option<(usize, usize)> {
        match self {
            LogKind::SmallFewUniform => Some((cfg.few_devices, cfg.small_events)),
            LogKind::SmallManyUniform => Some((cfg.many_devices, cfg.small_events)),
            LogKind::LargeFewUniform => Some((cfg.few_devices, cfg.large_events)),
            LogKind::LargeManyUniform => Some((cfg.many_devices, cfg.large_events)),
            LogKind::FewZipfian => Some((cfg.few_devices, cfg.large_events)),
            LogKind::ManyZipfian => Some((cfg.many_devices, cfg.large_events)),
            LogKind::Real => None,
        }
    }

    pub fn is_zipfian(self) -> bool {
        matches!(self, LogKind::FewZipfian | LogKind::ManyZipfian)
    }
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Index in `0..weights.len()` drawn with probability proportional to `weights[i]^p`
/// (zero weights are never chosen).
pub fn power_law_select<R: Rng + ?Sized>(rng: &mut R, weights: &[f64], p: f64) -> usize {
    let probs: Vec<f64> = weights
        .iter()
        .map(|&w| if w == 0.0 { 0.0 } else { w.powf(p) })
        .collect();
    let sum: f64 = probs.iter().sum();
    let mut r = sum * rng.gen::<f64>();
    for (i, prob) in probs.iter().enumerate() {
        r -= prob;
        if r < 0.0 {
            return i;
        }
    }
    probs.len().saturating_sub(1)
}

/// Zipf-distributed index in `0..size`, rank `i` weighted by `1 / (i + 1)`
pub fn zipf_index<R: Rng + ?Sized>(rng: &mut R, size: usize) -> usize {
    let ranks: Vec<f64> = (1..=size).map(|i| i as f64).collect();
    power_law_select(rng, &ranks, -1.0)
}

pub struct RandomLogGenerator {
    rng: StdRng,
    start: DateTime<Utc>,
    max_waiting_time_ms: i64,
    weather: Vec<WeatherSample>,
    random_start: bool,
}

impl RandomLogGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: seeded_rng(seed),
            start: Self::default_start(),
            max_waiting_time_ms: 7_200_000,
            weather: Vec::new(),
            random_start: false,
        }
    }

    /// 2019-11-18T00:00:00.001Z
    pub fn default_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 11, 18, 0, 0, 0)
            .single()
            .map(|t| t + Duration::milliseconds(1))
            .unwrap_or_default()
    }

    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    pub fn with_max_waiting_time(mut self, ms: i64) -> Self {
        self.max_waiting_time_ms = ms.max(0);
        self
    }

    /// Samples are attached to every generated log. With `random_start` the
    /// first event starts at a randomly chosen sample time.
    pub fn with_weather(mut self, samples: Vec<WeatherSample>, random_start: bool) -> Self {
        self.weather = samples;
        self.random_start = random_start;
        self
    }

    pub fn uniform_log(&mut self, devices: usize, events: usize) -> Log {
        let devices = devices.max(1);
        self.build(events, |rng| rng.gen_range(0..devices))
    }

    pub fn zipfian_log(&mut self, devices: usize, events: usize) -> Log {
        let devices = devices.max(1);
        self.build(events, |rng| zipf_index(rng, devices))
    }

    /// Generate the synthetic log of `kind`; `None` for [`LogKind::Real`].
    pub fn log_of_kind(&mut self, kind: LogKind, cfg: &EvaluationConfig) -> Option<Log> {
        let (devices, events) = kind.dimensions(cfg)?;
        let log = if kind.is_zipfian() {
            self.zipfian_log(devices, events)
        } else {
            self.uniform_log(devices, events)
        };
        info!(kind = %kind, devices, events, "synthetic log generated");
        Some(log)
    }

    fn start_time(&mut self) -> DateTime<Utc> {
        if self.random_start && !self.weather.is_empty() {
            let i = self.rng.gen_range(0..self.weather.len());
            return self.weather[i].timestamp;
        }
        self.start
    }

    fn build<F>(&mut self, events: usize, mut pick: F) -> Log
    where
        F: FnMut(&mut StdRng) -> usize,
    {
        let mut ts = self.start_time();
        let mut entries = Vec::with_capacity(events);
        for _ in 0..events {
            let device = pick(&mut self.rng);
            let wait = if self.max_waiting_time_ms > 0 {
                self.rng.gen_range(0..self.max_waiting_time_ms)
            } else {
                0
            };
            ts += Duration::milliseconds(wait);
            entries.push(LogEntry::new(ts, device));
        }
        let mut log = Log::from_entries(entries);
        if !self.weather.is_empty() {
            log.attach_weather(&self.weather);
            log.encode_weather_kinds();
        }
        log.scale();
        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn uniform_log_shape() {
        let mut gen = RandomLogGenerator::new(Some(0));
        let log = gen.uniform_log(5, 200);
        assert_eq!(log.len(), 200);
        assert!(log.iter().all(|e| e.device < 5));
        assert_eq!(log.first().unwrap().timestamp, RandomLogGenerator::default_start());
        assert!(log.idle_times().iter().all(|&d| (0..7_200_000).contains(&d)));
    }

    #[test]
    fn zipf_prefers_low_ranks() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts = [0usize; 10];
        for _ in 0..5000 {
            counts[zipf_index(&mut rng, 10)] += 1;
        }
        assert!(counts[0] > counts[4]);
        assert!(counts[4] > counts[9] / 2);
        assert!(counts[0] > 3 * counts[9]);
    }

    #[test]
    fn zero_weight_never_selected() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            assert_eq!(power_law_select(&mut rng, &[0.0, 2.0, 0.0], 1.0), 1);
        }
    }

    #[test]
    fn same_seed_same_log() {
        let a = RandomLogGenerator::new(Some(3)).zipfian_log(20, 100);
        let b = RandomLogGenerator::new(Some(3)).zipfian_log(20, 100);
        let da: Vec<usize> = a.iter().map(|e| e.device).collect();
        let db: Vec<usize> = b.iter().map(|e| e.device).collect();
        assert_eq!(da, db);
    }

    #[test]
    fn kind_names() {
        assert_eq!(LogKind::SmallFewUniform.name(), "smallFewUniformLog");
        assert_eq!(LogKind::Real.dimensions(&EvaluationConfig::default()), None);
        assert_eq!(
            LogKind::ManyZipfian.dimensions(&EvaluationConfig::default()),
            Some((150, 15000))
        );
    }
}
