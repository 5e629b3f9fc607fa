//! Ordered collection of entries plus the device name <-> label mapping.

use super::entry::LogEntry;
use crate::features::{Feature, MinMaxNormalizer, Standardizer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub const UNKNOWN_DEVICE: &str = "Unknown Device";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Log {
    entries: Vec<LogEntry>,
    in_mapping: HashMap<String, usize>,
    out_mapping: HashMap<usize, String>,
    device_count: usize,
}

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    /// Device count is derived as 1 + the largest label.
    pub fn from_entries(entries: Vec<LogEntry>) -> Self {
        let device_count = entries.iter().map(|e| e.device + 1).max().unwrap_or(0);
        Self {
            entries,
            device_count,
            ..Self::default()
        }
    }

    /// Keeps a caller-known device count (e.g. the parent log's after a split).
    pub fn with_device_count(entries: Vec<LogEntry>, device_count: usize) -> Self {
        let derived = entries.iter().map(|e| e.device + 1).max().unwrap_or(0);
        Self {
            entries,
            device_count: device_count.max(derived),
            ..Self::default()
        }
    }

    /// Append an event by device name, assigning the next dense label to unseen names.
    pub fn insert_entry(&mut self, timestamp: DateTime<Utc>, device_name: &str) -> usize {
        let label = match self.in_mapping.get(device_name) {
            Some(&label) => label,
            None => {
                let label = self.device_count;
                self.in_mapping.insert(device_name.to_string(), label);
                self.out_mapping.insert(label, device_name.to_string());
                self.device_count += 1;
                label
            }
        };
        self.entries.push(LogEntry::new(timestamp, label));
        label
    }

    /// Append an already-labelled entry
    pub fn push(&mut self, entry: LogEntry) {
        self.device_count = self.device_count.max(entry.device + 1);
        self.entries.push(entry);
    }

    pub fn get(&self, i: usize) -> Option<&LogEntry> {
        self.entries.get(i)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [LogEntry] {
        &mut self.entries
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LogEntry> {
        self.entries.iter()
    }

    pub fn first(&self) -> Option<&LogEntry> {
        self.entries.first()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    pub fn device_count(&self) -> usize {
        self.device_count
    }

    pub fn in_mapping(&self, device_name: &str) -> Option<usize> {
        self.in_mapping.get(device_name).copied()
    }

    pub fn out_mapping(&self, label: usize) -> &str {
        self.out_mapping
            .get(&label)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_DEVICE)
    }

    /// Copy the name mapping of another log (train/test halves share the parent's names).
    pub(crate) fn inherit_mapping(&mut self, other: &Log) {
        self.in_mapping = other.in_mapping.clone();
        self.out_mapping = other.out_mapping.clone();
        self.device_count = self.device_count.max(other.device_count);
    }

    /// Stable sort, equal timestamps keep insertion order.
    pub fn sort_by_timestamp(&mut self) {
        self.entries.sort_by_key(|e| e.timestamp);
    }

    /// (label, count) pairs, most frequent first
    pub fn device_distribution(&self) -> Vec<(usize, usize)> {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for e in &self.entries {
            *counts.entry(e.device).or_insert(0) += 1;
        }
        let mut out: Vec<(usize, usize)> = counts.into_iter().collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        out
    }

    /// Most frequently activated label, 0 for an empty log
    pub fn most_common_device(&self) -> usize {
        self.device_distribution().first().map(|d| d.0).unwrap_or(0)
    }

    /// Milliseconds between consecutive entries
    pub fn idle_times(&self) -> Vec<i64> {
        self.entries
            .windows(2)
            .map(|w| w[0].idle_time_until(&w[1]))
            .collect()
    }

    pub fn idle_time_bounds(&self) -> Option<(i64, i64)> {
        let idle = self.idle_times();
        Some((*idle.iter().min()?, *idle.iter().max()?))
    }

    /// Min-max scale every scalable feature to [0, 1] using log-wide bounds.
    pub fn scale(&mut self) {
        let bounds: Vec<(Feature, MinMaxNormalizer)> = Feature::ALL
            .iter()
            .filter(|f| f.is_min_max_scaled())
            .filter_map(|&f| MinMaxNormalizer::fit(self.entries.iter().map(|e| e.raw(f))).map(|n| (f, n)))
            .collect();
        for entry in &mut self.entries {
            for (feature, normalizer) in &bounds {
                let scaled = normalizer.scale(entry.raw(*feature));
                entry.set_scaled(*feature, scaled);
            }
            entry.set_scaled(Feature::Humidity, entry.weather.humidity);
            entry.set_scaled(Feature::Cloudiness, entry.weather.cloudiness);
        }
        debug!(entries = self.entries.len(), "log scaled");
    }

    /// Replace scaled values with z-scores (population standard deviation).
    pub fn standardize(&mut self) {
        let fitted: Vec<(Feature, Standardizer)> = Feature::ALL
            .iter()
            .filter(|f| f.is_min_max_scaled())
            .filter_map(|&f| {
                let values: Vec<f64> = self.entries.iter().map(|e| e.raw(f)).collect();
                Standardizer::fit(&values).map(|s| (f, s))
            })
            .collect();
        for entry in &mut self.entries {
            for (feature, standardizer) in &fitted {
                let z = standardizer.scale(entry.raw(*feature));
                entry.set_scaled(*feature, z);
            }
        }
    }
}

impl<'a> IntoIterator for &'a Log {
    type Item = &'a LogEntry;
    type IntoIter = std::slice::Iter<'a, LogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
