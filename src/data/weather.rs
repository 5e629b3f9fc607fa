//! Weather attachment: nearest preceding sample per entry, one-hot weather kinds.

use super::log::Log;
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// One provider observation, already in metric units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    pub timestamp: DateTime<Utc>,
    /// Degrees Celsius
    pub temperature: f64,
    pub felt_temperature: f64,
    /// hPa
    pub pressure: f64,
    /// Fraction in [0, 1]
    pub humidity: f64,
    /// m/s
    pub wind_speed: f64,
    /// Fraction in [0, 1]
    pub cloudiness: f64,
    pub kind: String,
}

/// Source of weather samples for a log's time span.
pub trait WeatherProvider {
    fn samples(&self) -> Vec<WeatherSample>;
}

/// Provider without data; attaching its samples leaves a log untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockWeatherProvider;

impl WeatherProvider for MockWeatherProvider {
    fn samples(&self) -> Vec<WeatherSample> {
        Vec::new()
    }
}

/// Fixed in-memory sample list.
#[derive(Debug, Clone, Default)]
pub struct StaticWeatherProvider {
    samples: Vec<WeatherSample>,
}

impl StaticWeatherProvider {
    pub fn new(mut samples: Vec<WeatherSample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);
        Self { samples }
    }
}

impl WeatherProvider for StaticWeatherProvider {
    fn samples(&self) -> Vec<WeatherSample> {
        self.samples.clone()
    }
}

fn floor_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(Duration::hours(1)).unwrap_or(ts)
}

fn ceil_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    let floor = floor_hour(ts);
    if floor == ts {
        ts
    } else {
        floor + Duration::hours(1)
    }
}

impl Log {
    /// Assign each entry the latest sample at or before its timestamp.
    ///
    /// Samples are first restricted to the open interval
    /// `(floor_hour(first) - 1h, ceil_hour(last) + 1h)`. Entries before the
    /// first remaining sample take that sample. Assumes entries are sorted.
    pub fn attach_weather(&mut self, samples: &[WeatherSample]) {
        let (first, last) = match (self.first(), self.last()) {
            (Some(f), Some(l)) => (f.timestamp, l.timestamp),
            _ => return,
        };
        let lower = floor_hour(first) - Duration::hours(1);
        let upper = ceil_hour(last) + Duration::hours(1);
        let mut window: Vec<&WeatherSample> = samples
            .iter()
            .filter(|s| s.timestamp > lower && s.timestamp < upper)
            .collect();
        if window.is_empty() {
            return;
        }
        window.sort_by_key(|s| s.timestamp);

        let mut current = 0usize;
        for entry in self.entries_mut() {
            while current + 1 < window.len() && window[current + 1].timestamp <= entry.timestamp {
                current += 1;
            }
            entry.set_weather(window[current]);
        }
        debug!(samples = window.len(), "weather attached");
    }

    /// One-hot encode weather kinds in first-seen order. The last kind seen is
    /// the reference category and encodes as all zeros.
    pub fn encode_weather_kinds(&mut self) {
        let mut order: HashMap<String, usize> = HashMap::new();
        for entry in self.entries() {
            let next = order.len();
            order.entry(entry.weather.kind.clone()).or_insert(next);
        }
        let width = order.len().saturating_sub(1);
        for entry in self.entries_mut() {
            let mut encoding = vec![0.0; width];
            if let Some(&idx) = order.get(&entry.weather.kind) {
                if idx < width {
                    encoding[idx] = 1.0;
                }
            }
            entry.weather_encoding = encoding;
        }
    }
}
