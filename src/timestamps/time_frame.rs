//! Time-of-day aware Poisson generator.
//!
//! The day is cut into `24 / frame_length` frames. The most active frames (by
//! share of training events) are core activity frames. Every device toggles
//! between on and off with each generated event. Inside a core frame, or while
//! the device is on, the idle time comes from the Poisson fitted for the
//! (frame, device) pair. Otherwise the idle time skips ahead to a random minute
//! of the next core frame.

use super::{
    effective_device_count, sample_poisson, sorted_copy, FitableTimestampGenerator, StatefulTimestampGenerator,
    TimestampGenerator,
};
use crate::config::{seeded_rng, TimestampConfig};
use crate::data::LogEntry;
use crate::error::{Result, SimError};
use chrono::{DateTime, Datelike, Days, Duration, LocalResult, TimeZone, Timelike, Utc};
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Frame index of `t` in the wall clock of `tz`.
pub fn time_frame_of<Tz: TimeZone>(t: &DateTime<Utc>, tz: &Tz, frame_length: u32) -> usize {
    (t.with_timezone(tz).hour() / frame_length.max(1)) as usize
}

#[derive(Debug, Clone)]
pub struct TimeFrameTimestampGenerator<Tz: TimeZone = Utc> {
    base: DateTime<Utc>,
    tz: Tz,
    frame_length: u32,
    split_ratio: f64,
    threshold_ms: f64,
    device_states: Vec<bool>,
    most_common_device: usize,
    /// Share of training events per frame
    occurrences: Vec<f64>,
    /// Core frames, most active first
    core_frames: Vec<usize>,
    /// Mean idle time per frame and predecessor device; `None` without samples
    means: Vec<Vec<Option<f64>>>,
    rng: StdRng,
}

impl TimeFrameTimestampGenerator<Utc> {
    pub fn new(
        base: DateTime<Utc>,
        frame_length: u32,
        split_ratio: f64,
        threshold_ms: f64,
        seed: Option<u64>,
    ) -> Result<Self> {
        if frame_length == 0 || 24 % frame_length != 0 {
            return Err(SimError::InvalidParameter(format!(
                "time frame length {frame_length} must divide 24"
            )));
        }
        if !(0.0..=1.0).contains(&split_ratio) {
            return Err(SimError::InvalidParameter(format!(
                "core split ratio {split_ratio} outside [0, 1]"
            )));
        }
        Ok(Self {
            base,
            tz: Utc,
            frame_length,
            split_ratio,
            threshold_ms,
            device_states: Vec::new(),
            most_common_device: 0,
            occurrences: Vec::new(),
            core_frames: Vec::new(),
            means: Vec::new(),
            rng: seeded_rng(seed),
        })
    }

    pub fn from_config(base: DateTime<Utc>, config: &TimestampConfig) -> Result<Self> {
        Self::new(
            base,
            config.time_frame_length_hours,
            config.core_split_ratio,
            config.time_frame_threshold_ms,
            config.seed,
        )
    }
}

impl<Tz: TimeZone> TimeFrameTimestampGenerator<Tz> {
    /// Read frames and calendar days in the wall clock of `tz`. Refit afterwards.
    pub fn with_time_zone<T: TimeZone>(self, tz: T) -> TimeFrameTimestampGenerator<T> {
        TimeFrameTimestampGenerator {
            base: self.base,
            tz,
            frame_length: self.frame_length,
            split_ratio: self.split_ratio,
            threshold_ms: self.threshold_ms,
            device_states: self.device_states,
            most_common_device: self.most_common_device,
            occurrences: self.occurrences,
            core_frames: self.core_frames,
            means: self.means,
            rng: self.rng,
        }
    }

    pub fn frame_count(&self) -> usize {
        (24 / self.frame_length) as usize
    }

    pub fn core_frames(&self) -> &[usize] {
        &self.core_frames
    }

    pub fn occurrences(&self) -> &[f64] {
        &self.occurrences
    }

    pub fn mean(&self, frame: usize, device: usize) -> Option<f64> {
        self.means.get(frame)?.get(device).copied().flatten()
    }

    pub fn device_state(&self, device: usize) -> bool {
        self.device_states.get(device).copied().unwrap_or(false)
    }

    pub fn current_frame(&self) -> usize {
        time_frame_of(&self.base, &self.tz, self.frame_length)
    }

    fn threshold(&self) -> i64 {
        self.threshold_ms as i64
    }

    /// Flip the device state and return the previous one.
    fn toggle(&mut self, device: usize) -> bool {
        if device >= self.device_states.len() {
            self.device_states.resize(device + 1, false);
        }
        let was_on = self.device_states[device];
        self.device_states[device] = !was_on;
        was_on
    }

    fn sample_in_frame(&mut self, frame: usize, device: usize) -> i64 {
        match self.mean(frame, device) {
            Some(mean) => sample_poisson(&mut self.rng, mean).min(self.threshold()),
            None => self.threshold(),
        }
    }

    /// Next core frame later in the day, else a random one.
    fn next_core_frame(&mut self, frame: usize) -> Option<usize> {
        if let Some(next) = self.core_frames.iter().copied().filter(|&f| f > frame).min() {
            return Some(next);
        }
        if self.core_frames.is_empty() {
            return None;
        }
        let mut frames = self.core_frames.clone();
        frames.sort_unstable();
        Some(frames[self.rng.gen_range(0..frames.len())])
    }

    /// Random minute and second in `hour` on the base's calendar day. A
    /// nonexistent local time (DST gap) moves one hour later.
    fn target_time(&mut self, hour: u32) -> Option<DateTime<Tz>> {
        let local = self.base.with_timezone(&self.tz);
        let (minute, second) = (self.rng.gen_range(0..60), self.rng.gen_range(0..60));
        for h in [hour, hour + 1] {
            match self.tz.with_ymd_and_hms(local.year(), local.month(), local.day(), h, minute, second) {
                LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => return Some(t),
                LocalResult::None => debug!(hour = h, "target hour does not exist locally, trying next hour"),
            }
        }
        None
    }

    fn idle_time_until_next_core_frame(&mut self, frame: usize) -> i64 {
        let Some(next) = self.next_core_frame(frame) else {
            return self.threshold();
        };
        let Some(mut target) = self.target_time(next as u32 * self.frame_length) else {
            return self.threshold();
        };
        let current = self.base.with_timezone(&self.tz);
        if target < current {
            target = match target.clone().checked_add_days(Days::new(1)) {
                Some(t) => t,
                None => target + Duration::days(1),
            };
        }
        (target.with_timezone(&Utc) - self.base).num_milliseconds()
    }
}

impl<Tz: TimeZone> TimestampGenerator for TimeFrameTimestampGenerator<Tz> {
    fn base_timestamp(&self) -> DateTime<Utc> {
        self.base
    }

    fn set_base_timestamp(&mut self, base: DateTime<Utc>) {
        self.base = base;
    }

    fn fallback_device(&self) -> usize {
        self.most_common_device
    }

    fn generate_length_for_device(&mut self, device: usize) -> i64 {
        let frame = self.current_frame();
        let in_core = self.core_frames.contains(&frame);
        let was_on = self.toggle(device);
        if in_core || was_on {
            self.sample_in_frame(frame, device)
        } else {
            self.idle_time_until_next_core_frame(frame)
        }
    }
}

impl<Tz: TimeZone> FitableTimestampGenerator for TimeFrameTimestampGenerator<Tz> {
    fn fit(&mut self, entries: &[LogEntry], device_count: usize) -> Result<()> {
        let devices = effective_device_count(entries, device_count);
        let entries = sorted_copy(entries);
        let frames = self.frame_count();

        self.device_states = vec![false; devices];

        let mut counts = vec![0usize; devices];
        for e in &entries {
            counts[e.device] += 1;
        }
        self.most_common_device = counts
            .iter()
            .enumerate()
            .fold((0, 0), |best, (d, &c)| if c > best.1 { (d, c) } else { best })
            .0;

        let mut by_frame: BTreeMap<usize, Vec<&LogEntry>> = BTreeMap::new();
        for e in &entries {
            by_frame
                .entry(time_frame_of(&e.timestamp, &self.tz, self.frame_length))
                .or_default()
                .push(e);
        }

        let total = entries.len().max(1) as f64;
        self.occurrences = vec![0.0; frames];
        for (&frame, list) in &by_frame {
            self.occurrences[frame] = list.len() as f64 / total;
        }

        let mut ranked: Vec<usize> = (0..frames).collect();
        ranked.sort_by(|&a, &b| self.occurrences[b].total_cmp(&self.occurrences[a]));
        ranked.truncate((frames as f64 * self.split_ratio) as usize);
        self.core_frames = ranked;

        let mut idle: Vec<Vec<Vec<i64>>> = vec![vec![Vec::new(); devices]; frames];
        for (&frame, list) in &by_frame {
            for pair in list.windows(2) {
                let day = pair[0].timestamp.with_timezone(&self.tz).date_naive();
                if pair[1].timestamp.with_timezone(&self.tz).date_naive() == day {
                    idle[frame][pair[0].device].push(pair[0].idle_time_until(pair[1]));
                }
            }
        }
        self.means = idle
            .iter()
            .map(|per_device| {
                per_device
                    .iter()
                    .map(|times| {
                        if times.is_empty() {
                            None
                        } else {
                            Some(times.iter().sum::<i64>() as f64 / times.len() as f64)
                        }
                    })
                    .collect()
            })
            .collect();

        info!(
            devices,
            frames,
            core_frames = ?self.core_frames,
            most_common_device = self.most_common_device,
            "time frame generator fitted"
        );
        Ok(())
    }
}

impl<Tz: TimeZone> StatefulTimestampGenerator for TimeFrameTimestampGenerator<Tz> {}
