//! Markov chain label model over time-separated episodes.
//!
//! Every episode is walked as a path through a prefix tree of nodes: the first
//! entry selects (or creates) the start node for its device, each following
//! entry counts a transition on the current node and moves to the successor
//! node for that device. Start nodes are shared between episodes that begin
//! with the same device; all other nodes belong to a single path prefix.
//! Nodes live in an arena and refer to each other by index.

use super::{LabelPredictor, StatefulLabelPredictor};
use crate::config::{seeded_rng, MarkovConfig};
use crate::data::LogEntry;
use crate::error::Result;
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::HashMap;
use tracing::{info, warn};

pub type NodeId = usize;

#[derive(Debug, Clone)]
struct Node {
    /// Observed transitions per successor device
    counts: Vec<u32>,
    incoming: u32,
    transitions: HashMap<usize, NodeId>,
}

impl Node {
    fn new(devices: usize) -> Self {
        Self {
            counts: vec![0; devices],
            incoming: 0,
            transitions: HashMap::new(),
        }
    }

    /// `counts[d] / incoming`; all NaN when nothing left this node.
    fn probabilities(&self) -> Vec<f64> {
        let incoming = self.incoming as f64;
        self.counts.iter().map(|&c| c as f64 / incoming).collect()
    }
}

/// Split time-ordered entries wherever consecutive entries are at least `gap_ms` apart.
pub(crate) fn split_into_episodes(entries: &[LogEntry], gap_ms: i64) -> Vec<&[LogEntry]> {
    let mut episodes = Vec::new();
    let mut start = 0;
    for i in 1..entries.len() {
        if entries[i - 1].idle_time_until(&entries[i]) >= gap_ms {
            episodes.push(&entries[start..i]);
            start = i;
        }
    }
    if start < entries.len() {
        episodes.push(&entries[start..]);
    }
    episodes
}

/// Roulette-wheel draw over `(probability, label)` pairs sorted ascending.
///
/// Returns the first index at which the remaining toss reaches zero or below, or
/// the last index if it never does (which is what NaN probabilities produce).
fn roulette(pairs: &[(f64, usize)], mut toss: f64) -> usize {
    for (i, (p, _)) in pairs.iter().enumerate() {
        toss -= p;
        if toss <= 0.0 {
            return i;
        }
    }
    pairs.len().saturating_sub(1)
}

#[derive(Debug, Clone)]
pub struct MarkovModel {
    config: MarkovConfig,
    acyclic: bool,
    device_count: usize,
    nodes: Vec<Node>,
    start_nodes: HashMap<usize, NodeId>,
    cursor: Option<NodeId>,
    rng: StdRng,
}

impl MarkovModel {
    pub fn new(config: MarkovConfig) -> Self {
        let rng = seeded_rng(config.seed);
        Self {
            acyclic: config.acyclic,
            config,
            device_count: 0,
            nodes: Vec::new(),
            start_nodes: HashMap::new(),
            cursor: None,
            rng,
        }
    }

    pub fn device_count(&self) -> usize {
        self.device_count
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn start_node(&self, device: usize) -> Option<NodeId> {
        self.start_nodes.get(&device).copied()
    }

    pub fn successor(&self, node: NodeId, device: usize) -> Option<NodeId> {
        self.nodes.get(node)?.transitions.get(&device).copied()
    }

    pub fn incoming(&self, node: NodeId) -> Option<u32> {
        self.nodes.get(node).map(|n| n.incoming)
    }

    /// Transition probabilities of a node, indexed by device label
    pub fn probabilities(&self, node: NodeId) -> Option<Vec<f64>> {
        self.nodes.get(node).map(Node::probabilities)
    }

    fn alloc(&mut self) -> NodeId {
        self.nodes.push(Node::new(self.device_count));
        self.nodes.len() - 1
    }

    fn start_node_or_insert(&mut self, device: usize) -> NodeId {
        if let Some(&id) = self.start_nodes.get(&device) {
            return id;
        }
        let id = self.alloc();
        self.start_nodes.insert(device, id);
        id
    }

    fn record_transition(&mut self, from: NodeId, device: usize) -> NodeId {
        let node = &mut self.nodes[from];
        node.incoming += 1;
        node.counts[device] += 1;
        if let Some(&next) = node.transitions.get(&device) {
            return next;
        }
        let next = self.alloc();
        self.nodes[from].transitions.insert(device, next);
        next
    }

    fn build(&mut self, entries: &[LogEntry]) {
        let episodes = split_into_episodes(entries, self.config.episode_gap_ms);
        let episode_count = episodes.len();
        for episode in episodes {
            let mut current: Option<NodeId> = None;
            let mut predecessor: Option<usize> = None;
            for entry in episode {
                if !self.acyclic || predecessor != Some(entry.device) {
                    current = Some(match current {
                        None => self.start_node_or_insert(entry.device),
                        Some(node) => self.record_transition(node, entry.device),
                    });
                }
                predecessor = Some(entry.device);
            }
        }
        info!(
            episodes = episode_count,
            nodes = self.nodes.len(),
            start_nodes = self.start_nodes.len(),
            devices = self.device_count,
            "markov chain built"
        );
    }

    /// Cursor if set, else the start node for `previous`, else a random start node.
    fn prediction_node(&mut self, previous: usize) -> Option<NodeId> {
        if let Some(node) = self.cursor {
            return Some(node);
        }
        if let Some(&node) = self.start_nodes.get(&previous) {
            return Some(node);
        }
        if self.start_nodes.is_empty() {
            return None;
        }
        let mut keys: Vec<usize> = self.start_nodes.keys().copied().collect();
        keys.sort_unstable();
        let key = keys[self.rng.gen_range(0..keys.len())];
        warn!(device = previous, chosen = key, "no start node for device, choosing random start node");
        self.start_nodes.get(&key).copied()
    }

    fn predict_device(&mut self, previous: usize) -> usize {
        let Some(node) = self.prediction_node(previous) else {
            return 0;
        };
        let mut pairs: Vec<(f64, usize)> = self.nodes[node]
            .probabilities()
            .into_iter()
            .enumerate()
            .map(|(label, p)| (p, label))
            .collect();
        if pairs.is_empty() {
            self.cursor = None;
            return 0;
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        let toss: f64 = self.rng.gen();
        let label = pairs[roulette(&pairs, toss)].1;
        self.cursor = self.nodes[node].transitions.get(&label).copied();
        label
    }
}

impl Default for MarkovModel {
    fn default() -> Self {
        Self::new(MarkovConfig::default())
    }
}

impl LabelPredictor for MarkovModel {
    fn fit(&mut self, entries: &[LogEntry], acyclic: bool, device_count: usize) -> Result<()> {
        let derived = entries.iter().map(|e| e.device + 1).max().unwrap_or(0);
        let mut sorted = entries.to_vec();
        sorted.sort_by_key(|e| e.timestamp);

        self.acyclic = acyclic;
        self.device_count = device_count.max(derived);
        self.nodes.clear();
        self.start_nodes.clear();
        self.cursor = None;
        self.rng = seeded_rng(self.config.seed);
        self.build(&sorted);
        Ok(())
    }

    fn predict_entry(&mut self, entry: &LogEntry) -> usize {
        self.predict_device(entry.device)
    }

    /// Replays the last episode of `entries` through the chain.
    fn predict_entries(&mut self, entries: &[LogEntry]) -> usize {
        let episodes = split_into_episodes(entries, self.config.episode_gap_ms);
        let Some(last) = episodes.last() else {
            return 0;
        };
        let mut next = 0;
        for entry in last.iter() {
            next = self.predict_device(entry.device);
        }
        next
    }
}

impl StatefulLabelPredictor for MarkovModel {
    fn predict_sequence_from_entry(&mut self, entry: &LogEntry, n: usize) -> Vec<usize> {
        let mut out = Vec::with_capacity(n);
        let mut last = entry.device;
        for _ in 0..n {
            last = self.predict_device(last);
            out.push(last);
        }
        out
    }

    fn predict_sequence(&mut self, entries: &[LogEntry], n: usize) -> Vec<usize> {
        if n == 0 {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(n);
        let mut last = self.predict_entries(entries);
        out.push(last);
        for _ in 1..n {
            last = self.predict_device(last);
            out.push(last);
        }
        out
    }

    fn reset_predictions(&mut self) {
        self.cursor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 11, 18, 6, 0, 0).unwrap()
    }

    fn hourly(devices: &[usize]) -> Vec<LogEntry> {
        devices
            .iter()
            .enumerate()
            .map(|(i, &d)| LogEntry::new(t0() + Duration::hours(i as i64), d))
            .collect()
    }

    #[test]
    fn alternating_log_predicts_only_observed_transition() {
        let mut model = MarkovModel::default();
        model.fit(&hourly(&[0, 1, 0, 1, 0]), false, 2).unwrap();
        for _ in 0..20 {
            model.reset_predictions();
            assert_eq!(model.predict_entry(&LogEntry::new(t0(), 0)), 1);
        }
    }

    #[test]
    fn episodes_split_on_long_gaps() {
        let mut entries = hourly(&[0, 1]);
        entries.push(LogEntry::new(t0() + Duration::hours(4), 2));
        entries.push(LogEntry::new(t0() + Duration::hours(5), 0));
        let episodes = split_into_episodes(&entries, 7_200_000);
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[1][0].device, 2);
        assert!(split_into_episodes(&[], 7_200_000).is_empty());
    }

    #[test]
    fn start_nodes_are_shared_between_episodes() {
        let mut entries = hourly(&[0, 1]);
        entries.push(LogEntry::new(t0() + Duration::hours(5), 0));
        entries.push(LogEntry::new(t0() + Duration::hours(6), 2));
        let mut model = MarkovModel::default();
        model.fit(&entries, false, 3).unwrap();
        let start = model.start_node(0).unwrap();
        assert_eq!(model.incoming(start), Some(2));
        assert_eq!(model.probabilities(start).unwrap(), vec![0.0, 0.5, 0.5]);
        // one start node plus two successors
        assert_eq!(model.node_count(), 3);
    }

    #[test]
    fn acyclic_skips_immediate_repeats() {
        let mut model = MarkovModel::default();
        model.fit(&hourly(&[0, 0, 1]), true, 2).unwrap();
        let start = model.start_node(0).unwrap();
        assert_eq!(model.probabilities(start).unwrap(), vec![0.0, 1.0]);

        let mut cyclic = MarkovModel::default();
        cyclic.fit(&hourly(&[0, 0, 1]), false, 2).unwrap();
        let start = cyclic.start_node(0).unwrap();
        assert_eq!(cyclic.probabilities(start).unwrap(), vec![1.0, 0.0]);
    }

    #[test]
    fn node_without_successors_yields_highest_label() {
        // 0 -> 1 ends the only episode, so the node reached via 1 has incoming == 0
        let mut model = MarkovModel::default();
        model.fit(&hourly(&[0, 1]), false, 4).unwrap();
        let start = model.start_node(0).unwrap();
        let leaf = model.successor(start, 1).unwrap();
        assert_eq!(model.incoming(leaf), Some(0));
        assert!(model.probabilities(leaf).unwrap().iter().all(|p| p.is_nan()));

        assert_eq!(model.predict_entry(&LogEntry::new(t0(), 0)), 1);
        assert_eq!(model.predict_entry(&LogEntry::new(t0(), 0)), 3);
        // no successor for label 3, so the cursor resolves the start node again
        assert_eq!(model.predict_entry(&LogEntry::new(t0(), 0)), 1);
    }

    #[test]
    fn unknown_device_falls_back_to_known_start_node() {
        let mut model = MarkovModel::default();
        model.fit(&hourly(&[0, 1, 0, 1, 0]), false, 6).unwrap();
        // only one start node exists, so the random choice is deterministic
        assert_eq!(model.predict_entry(&LogEntry::new(t0(), 5)), 1);
    }

    #[test]
    fn unfitted_model_predicts_default_label() {
        let mut model = MarkovModel::default();
        assert_eq!(model.predict_entry(&LogEntry::new(t0(), 3)), 0);
        assert_eq!(model.predict_entries(&[]), 0);
        assert_eq!(model.predict_sequence(&[], 3), vec![0, 0, 0]);
    }

    #[test]
    fn same_seed_same_sequence() {
        let log = hourly(&[0, 1, 2, 1, 0, 2, 2, 1, 0, 1, 2, 0]);
        let mut a = MarkovModel::default();
        let mut b = MarkovModel::default();
        a.fit(&log, false, 3).unwrap();
        b.fit(&log, false, 3).unwrap();
        let seed = LogEntry::new(t0(), 0);
        assert_eq!(
            a.predict_sequence_from_entry(&seed, 30),
            b.predict_sequence_from_entry(&seed, 30)
        );
    }

    #[test]
    fn roulette_picks_first_exhausted_remainder() {
        let pairs = vec![(0.2, 0), (0.3, 2), (0.5, 1)];
        assert_eq!(roulette(&pairs, 0.1), 0);
        // landing exactly on a boundary stays in the lower interval
        assert_eq!(roulette(&pairs, 0.2), 0);
        assert_eq!(roulette(&pairs, 0.25), 1);
        assert_eq!(roulette(&pairs, 0.99), 2);
        assert_eq!(roulette(&[(0.0, 3), (1.0, 0)], 0.0), 0);
        assert_eq!(roulette(&[(f64::NAN, 0), (f64::NAN, 1)], 0.3), 1);
    }

    proptest! {
        #[test]
        fn visited_node_probabilities_sum_to_one(
            devices in prop::collection::vec(0usize..5, 2..80),
            gaps in prop::collection::vec(1i64..240, 80),
        ) {
            let mut ts = t0();
            let entries: Vec<LogEntry> = devices
                .iter()
                .enumerate()
                .map(|(i, &d)| {
                    ts += Duration::minutes(gaps[i]);
                    LogEntry::new(ts, d)
                })
                .collect();
            let mut model = MarkovModel::default();
            model.fit(&entries, false, 5).unwrap();
            for node in 0..model.node_count() {
                if model.incoming(node) > Some(0) {
                    let sum: f64 = model.probabilities(node).unwrap().iter().sum();
                    prop_assert!((sum - 1.0).abs() < 1e-9);
                }
            }
        }
    }
}
