//! A single recorded or synthesised device activation.

use super::weather::WeatherSample;
use crate::features::{Feature, FeatureVector};
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Raw weather attributes attached to an entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherFeatures {
    pub temperature: f64,
    pub felt_temperature: f64,
    pub pressure: f64,
    /// Fraction in [0, 1]
    pub humidity: f64,
    pub wind_speed: f64,
    /// Fraction in [0, 1]
    pub cloudiness: f64,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub device: usize,
    /// 1.0 on Saturday and Sunday
    pub weekend: f64,
    /// Minute of day
    pub time_of_day: f64,
    pub day_of_year: f64,
    pub weather: WeatherFeatures,
    /// Scaled values, indexed by [`Feature::index`]
    pub scaled: [f64; 8],
    /// One-hot weather kind, reference kind is all zeros
    pub weather_encoding: Vec<f64>,
}

impl LogEntry {
    pub fn new(timestamp: DateTime<Utc>, device: usize) -> Self {
        let weekend = match timestamp.weekday() {
            Weekday::Sat | Weekday::Sun => 1.0,
            _ => 0.0,
        };
        Self {
            timestamp,
            device,
            weekend,
            time_of_day: (timestamp.hour() * 60 + timestamp.minute()) as f64,
            day_of_year: timestamp.ordinal() as f64,
            weather: WeatherFeatures::default(),
            scaled: [0.0; 8],
            weather_encoding: Vec::new(),
        }
    }

    /// Unscaled value of a feature
    pub fn raw(&self, feature: Feature) -> f64 {
        match feature {
            Feature::TimeOfDay => self.time_of_day,
            Feature::DayOfYear => self.day_of_year,
            Feature::RealTemperature => self.weather.temperature,
            Feature::FeltTemperature => self.weather.felt_temperature,
            Feature::Pressure => self.weather.pressure,
            Feature::Humidity => self.weather.humidity,
            Feature::WindSpeed => self.weather.wind_speed,
            Feature::Cloudiness => self.weather.cloudiness,
        }
    }

    pub fn scaled(&self, feature: Feature) -> f64 {
        self.scaled[feature.index()]
    }

    pub fn set_scaled(&mut self, feature: Feature, value: f64) {
        self.scaled[feature.index()] = value;
    }

    /// Attach weather; scaled weather slots start out as the raw values.
    pub fn set_weather(&mut self, sample: &WeatherSample) {
        self.weather = WeatherFeatures {
            temperature: sample.temperature,
            felt_temperature: sample.felt_temperature,
            pressure: sample.pressure,
            humidity: sample.humidity,
            wind_speed: sample.wind_speed,
            cloudiness: sample.cloudiness,
            kind: sample.kind.clone(),
        };
        for feature in [
            Feature::RealTemperature,
            Feature::FeltTemperature,
            Feature::Pressure,
            Feature::Humidity,
            Feature::WindSpeed,
            Feature::Cloudiness,
        ] {
            self.scaled[feature.index()] = self.raw(feature);
        }
    }

    /// Scaled features followed by the weather-kind encoding
    pub fn features(&self) -> FeatureVector {
        let mut values = Vec::with_capacity(self.scaled.len() + self.weather_encoding.len());
        values.extend_from_slice(&self.scaled);
        values.extend_from_slice(&self.weather_encoding);
        FeatureVector::new(values)
    }

    /// Milliseconds until `next`
    pub fn idle_time_until(&self, next: &LogEntry) -> i64 {
        (next.timestamp - self.timestamp).num_milliseconds()
    }
}
