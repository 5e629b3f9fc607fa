//! Event logs: entries, device mapping, weather, splits and synthetic generation.

mod entry;
mod log;
mod split;
pub mod synthetic;
mod weather;

pub use entry::{LogEntry, WeatherFeatures};
pub use log::{Log, UNKNOWN_DEVICE};
pub use split::{train_test_split, TrainTestSplit};
pub use synthetic::{LogKind, RandomLogGenerator};
pub use weather::{MockWeatherProvider, StaticWeatherProvider, WeatherProvider, WeatherSample};

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::features::Feature;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn scaled_features_within_unit_interval(
            gaps in prop::collection::vec(0i64..10_000_000, 1..60),
            devices in prop::collection::vec(0usize..8, 60),
            temps in prop::collection::vec(-20.0f64..40.0, 4),
        ) {
            let t0 = Utc.with_ymd_and_hms(2019, 12, 30, 20, 0, 0).unwrap();
            let mut ts = t0;
            let mut entries = Vec::new();
            for (i, gap) in gaps.iter().enumerate() {
                ts += Duration::milliseconds(*gap);
                entries.push(LogEntry::new(ts, devices[i]));
            }
            let samples: Vec<WeatherSample> = temps
                .iter()
                .enumerate()
                .map(|(i, &t)| WeatherSample {
                    timestamp: t0 + Duration::hours(i as i64 * 3),
                    temperature: t,
                    felt_temperature: t - 1.5,
                    pressure: 1000.0 + t,
                    humidity: 0.6,
                    wind_speed: t.abs() / 4.0,
                    cloudiness: 0.1,
                    kind: if i % 2 == 0 { "Clear".into() } else { "Rain".into() },
                })
                .collect();
            let mut log = Log::from_entries(entries);
            log.attach_weather(&samples);
            log.scale();
            for e in log.iter() {
                for f in Feature::ALL {
                    let v = e.scaled(f);
                    prop_assert!((0.0..=1.0).contains(&v), "{:?} = {}", f, v);
                }
            }
        }
    }
}
