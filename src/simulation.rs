//! Continuation simulation: fit a label model and a timestamp model on a log,
//! then produce new `(timestamp, label, device name)` events.
//!
//! Two stopping rules exist. With an `until` bound the generated entries are
//! fed back as history until a timestamp reaches the bound. Without one, the
//! test portion of the log is replayed in sliding windows until
//! `number_of_events` events exist or the windows run out.

use crate::config::SimulationConfig;
use crate::data::{train_test_split, Log, LogEntry};
use crate::error::{Result, SimError};
use crate::model::{LabelModel, LabelPredictor};
use crate::timestamps::{FitableTimestampGenerator, TimestampGenerator, TimestampModel};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Consecutive non-advancing timestamps tolerated in `until` mode.
const MAX_STALLED_STEPS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatedEvent {
    pub timestamp: DateTime<Utc>,
    pub label: usize,
    pub device: String,
}

pub struct Simulator {
    config: SimulationConfig,
    labels: LabelModel,
    timestamps: TimestampModel,
    stop: Arc<AtomicBool>,
}

impl Simulator {
    pub fn new(config: SimulationConfig, labels: LabelModel, timestamps: TimestampModel) -> Self {
        Self {
            config,
            labels,
            timestamps,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Build both models from the kinds named in `config.simulation`.
    pub fn from_config(config: SimulationConfig, start: DateTime<Utc>) -> Result<Self> {
        let labels = LabelModel::from_kind(config.simulation.label_model, &config)?;
        let timestamps = TimestampModel::from_kind(config.simulation.timestamp_model, start, &config.timestamps)?;
        Ok(Self::new(config, labels, timestamps))
    }

    /// Shared flag checked between events; setting it ends the run early.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Fit on `log` and generate events starting at `start`.
    pub fn simulate(&mut self, log: &Log, start: DateTime<Utc>) -> Result<Vec<SimulatedEvent>> {
        if log.is_empty() {
            return Err(SimError::EmptyLog);
        }
        if self.config.simulation.until.is_none() && self.config.simulation.number_of_events == 0 {
            return Ok(Vec::new());
        }

        self.labels.fit_log(log, self.config.markov.acyclic)?;
        self.timestamps.set_base_timestamp(start);
        self.timestamps.fit_log(log)?;
        info!(
            label_model = self.labels.name(),
            timestamp_model = self.timestamps.name(),
            entries = log.len(),
            "simulation models fitted"
        );

        let label = self.labels.predict_log(log);
        let timestamp = self.timestamps.generate_timestamp_for_device(label);
        let mut events = vec![event(log, timestamp, label)];

        let until = self.config.simulation.until;
        match until {
            Some(until) => self.run_until(log, until, &mut events)?,
            None => self.run_windows(log, &mut events)?,
        }
        info!(events = events.len(), "simulation finished");
        Ok(events)
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    fn run_until(&mut self, log: &Log, until: DateTime<Utc>, events: &mut Vec<SimulatedEvent>) -> Result<()> {
        let mut history: Vec<LogEntry> = events.iter().map(|e| LogEntry::new(e.timestamp, e.label)).collect();
        let mut last = events.last().map(|e| e.timestamp).unwrap_or(until);
        let mut stalled = 0;
        while last < until {
            if self.stopped() {
                warn!(events = events.len(), "simulation interrupted");
                break;
            }
            let label = self.labels.predict_entries(&history);
            let timestamp = self.timestamps.generate_timestamp_for_device(label);
            if timestamp <= last {
                stalled += 1;
                if stalled >= MAX_STALLED_STEPS {
                    return Err(SimError::InvalidParameter(format!(
                        "{} does not advance time, cannot reach {until}",
                        self.timestamps.name()
                    )));
                }
            } else {
                stalled = 0;
            }
            last = last.max(timestamp);
            history.push(LogEntry::new(timestamp, label));
            events.push(event(log, timestamp, label));
        }
        Ok(())
    }

    fn run_windows(&mut self, log: &Log, events: &mut Vec<SimulatedEvent>) -> Result<()> {
        let wanted = self.config.simulation.number_of_events;
        let window = self.config.simulation.window.max(1);
        let split = train_test_split(log, self.config.evaluation.split_ratio)?;
        debug!(test = split.test.len(), window, "replaying test windows");
        for input in split.test.entries().windows(window) {
            if events.len() >= wanted || self.stopped() {
                break;
            }
            let label = self.labels.predict_entries(input);
            let timestamp = self.timestamps.generate_timestamp_for_device(label);
            events.push(event(log, timestamp, label));
        }
        Ok(())
    }
}

fn event(log: &Log, timestamp: DateTime<Utc>, label: usize) -> SimulatedEvent {
    SimulatedEvent {
        timestamp,
        label,
        device: log.out_mapping(label).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{RandomLogGenerator, UNKNOWN_DEVICE};
    use crate::model::LabelModelKind;
    use crate::timestamps::TimestampModelKind;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 3, 1, 12, 0, 0).unwrap()
    }

    fn config(label: LabelModelKind, ts: TimestampModelKind) -> SimulationConfig {
        let mut cfg = SimulationConfig::default();
        cfg.simulation.label_model = label;
        cfg.simulation.timestamp_model = ts;
        cfg
    }

    fn named_log() -> Log {
        let mut log = Log::new();
        let names = ["door", "kitchen", "hall", "tv"];
        let mut ts = Utc.with_ymd_and_hms(2019, 11, 18, 6, 0, 0).unwrap();
        for i in 0..100 {
            log.insert_entry(ts, names[(i * 7 + i / 3) % names.len()]);
            ts += Duration::minutes(13 + (i as i64 % 5) * 7);
        }
        log
    }

    #[test]
    fn windowed_replay_stops_at_requested_count() {
        let mut cfg = config(LabelModelKind::Markov, TimestampModelKind::Uniform);
        cfg.simulation.number_of_events = 5;
        let log = named_log();
        let mut sim = Simulator::from_config(cfg, start()).unwrap();
        let events = sim.simulate(&log, start()).unwrap();

        assert_eq!(events.len(), 5);
        for pair in events.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
        for e in &events {
            assert!(e.label < 4);
            assert_eq!(log.in_mapping(&e.device), Some(e.label));
            assert!(e.timestamp >= start());
        }
    }

    #[test]
    fn windowed_replay_is_bounded_by_test_windows() {
        // 100 entries, 20 in the test part, 11 windows of 10, plus the first event
        let mut cfg = config(LabelModelKind::Markov, TimestampModelKind::Poisson);
        cfg.simulation.number_of_events = 500;
        let log = RandomLogGenerator::new(Some(3)).uniform_log(4, 100);
        let mut sim = Simulator::from_config(cfg, start()).unwrap();
        let events = sim.simulate(&log, start()).unwrap();
        assert_eq!(events.len(), 12);
        assert!(events.iter().all(|e| e.device == UNKNOWN_DEVICE));
    }

    #[test]
    fn until_mode_reaches_the_bound() {
        let mut cfg = config(LabelModelKind::Markov, TimestampModelKind::Uniform);
        cfg.timestamps.uniform_upper_border_ms = 60_000;
        let until = start() + Duration::hours(1);
        cfg.simulation.until = Some(until);
        let log = named_log();
        let mut sim = Simulator::from_config(cfg, start()).unwrap();
        let events = sim.simulate(&log, start()).unwrap();

        let last = events.last().unwrap().timestamp;
        assert!(last >= until);
        assert!(events[..events.len() - 1].iter().all(|e| e.timestamp < until));
        // each step waits at most a minute
        assert!(events.len() >= 60);
    }

    #[test]
    fn until_mode_rejects_a_generator_that_never_advances() {
        let mut cfg = config(LabelModelKind::Markov, TimestampModelKind::Mock);
        cfg.simulation.until = Some(start() + Duration::days(1));
        let mut sim = Simulator::from_config(cfg, start()).unwrap();
        assert!(matches!(
            sim.simulate(&named_log(), start()),
            Err(SimError::InvalidParameter(_))
        ));
    }

    #[test]
    fn stop_flag_ends_until_mode() {
        let mut cfg = config(LabelModelKind::Markov, TimestampModelKind::Uniform);
        cfg.simulation.until = Some(start() + Duration::days(3650));
        let mut sim = Simulator::from_config(cfg, start()).unwrap();
        sim.stop_flag().store(true, Ordering::Relaxed);
        let events = sim.simulate(&named_log(), start()).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn empty_log_and_zero_events() {
        let cfg = config(LabelModelKind::Markov, TimestampModelKind::Uniform);
        let mut sim = Simulator::from_config(cfg.clone(), start()).unwrap();
        assert!(matches!(sim.simulate(&Log::new(), start()), Err(SimError::EmptyLog)));

        let mut zero = cfg;
        zero.simulation.number_of_events = 0;
        let mut sim = Simulator::from_config(zero, start()).unwrap();
        assert!(sim.simulate(&named_log(), start()).unwrap().is_empty());
    }

    #[test]
    fn black_box_kinds_are_unavailable_from_config() {
        let cfg = config(LabelModelKind::Lstm, TimestampModelKind::Uniform);
        assert!(matches!(
            Simulator::from_config(cfg, start()),
            Err(SimError::ModelUnavailable(_))
        ));
    }
}
