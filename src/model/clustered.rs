//! One Markov chain per k-means cluster of the training entries.

use super::kmeans::{nearest_cluster, Cluster, KMeansClusterBuilder};
use super::markov::MarkovModel;
use super::{LabelPredictor, StatefulLabelPredictor};
use crate::config::{ClusteringConfig, MarkovConfig};
use crate::data::LogEntry;
use crate::error::{Result, SimError};
use crate::features::FeatureVector;
use tracing::{debug, info};

fn argmin<I: Iterator<Item = (usize, f64)>>(values: I) -> Option<usize> {
    values
        .fold(None, |best: Option<(usize, f64)>, (i, v)| match best {
            Some((_, b)) if v >= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Pick k from per-k quality scores (index 0 = `k_min`).
///
/// Interior candidates are ranked by the absolute second difference of the
/// score curve, the smallest wins. With fewer than three candidates there is
/// no interior point and the lowest raw score wins.
pub fn select_k(k_min: usize, scores: &[f64]) -> Option<usize> {
    if scores.len() < 3 {
        return argmin(scores.iter().copied().enumerate()).map(|i| k_min + i);
    }
    let curvature =
        (1..scores.len() - 1).map(|i| (i, (scores[i + 1] + scores[i - 1] - 2.0 * scores[i]).abs()));
    argmin(curvature).map(|i| k_min + i)
}

#[derive(Debug, Clone)]
pub struct ClusteredMarkovModel {
    clustering: ClusteringConfig,
    markov: MarkovConfig,
    k: usize,
    centroids: Vec<Cluster>,
    models: Vec<MarkovModel>,
    device_count: usize,
}

impl ClusteredMarkovModel {
    pub fn new(clustering: ClusteringConfig, markov: MarkovConfig) -> Self {
        Self {
            clustering,
            markov,
            k: 0,
            centroids: Vec::new(),
            models: Vec::new(),
            device_count: 0,
        }
    }

    /// Selected cluster count, 0 before fitting
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.centroids
    }

    pub fn models(&self) -> &[MarkovModel] {
        &self.models
    }

    fn membership(&self, entry: &LogEntry) -> Option<usize> {
        nearest_cluster(&self.centroids, &entry.features())
    }

    /// Cluster with the smallest average centroid distance over all entries
    fn membership_of_all(&self, entries: &[LogEntry]) -> Option<usize> {
        if entries.is_empty() {
            return None;
        }
        let features: Vec<FeatureVector> = entries.iter().map(LogEntry::features).collect();
        let n = features.len() as f64;
        let mut best: Option<(usize, f64)> = None;
        for (i, c) in self.centroids.iter().enumerate() {
            let avg = features.iter().map(|f| c.distance_to(f)).sum::<f64>() / n;
            match best {
                Some((_, min)) if avg >= min => {}
                _ => best = Some((i, avg)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// Cluster the entries for each candidate k and keep the clustering the curvature rule selects.
    fn best_clustering(&self, entries: &[LogEntry]) -> Result<(usize, Vec<Cluster>, Vec<LogEntry>)> {
        let (k_min, k_max) = (self.clustering.k_min, self.clustering.k_max);
        if k_min < 1 || k_max < k_min {
            return Err(SimError::IllegalNumberOfClusters { requested: k_min });
        }
        let mut scores = Vec::new();
        let mut candidates = Vec::new();
        for k in k_min..=k_max {
            let mut builder = KMeansClusterBuilder::from_config(entries, k, &self.clustering)?;
            let (quality, clusters) = builder.calculate_best_clustering(self.clustering.attempts);
            debug!(k, quality, "clustering scored");
            scores.push(quality);
            candidates.push((clusters, builder.entries().to_vec()));
        }
        let k = select_k(k_min, &scores).ok_or(SimError::IllegalNumberOfClusters { requested: k_min })?;
        let (clusters, members) = candidates.swap_remove(k - k_min);
        Ok((k, clusters, members))
    }
}

impl Default for ClusteredMarkovModel {
    fn default() -> Self {
        Self::new(ClusteringConfig::default(), MarkovConfig::default())
    }
}

impl LabelPredictor for ClusteredMarkovModel {
    fn fit(&mut self, entries: &[LogEntry], acyclic: bool, device_count: usize) -> Result<()> {
        if entries.is_empty() {
            return Err(SimError::EmptyLog);
        }
        let derived = entries.iter().map(|e| e.device + 1).max().unwrap_or(0);
        self.device_count = device_count.max(derived);

        let mut sorted = entries.to_vec();
        sorted.sort_by_key(|e| e.timestamp);
        let (k, clusters, members) = self.best_clustering(&sorted)?;

        let mut models = Vec::with_capacity(clusters.len());
        for cluster in &clusters {
            let mut model = MarkovModel::new(self.markov.clone());
            model.fit(&cluster.member_entries(&members), acyclic, self.device_count)?;
            models.push(model);
        }
        info!(k, devices = self.device_count, entries = sorted.len(), "clustered markov model fitted");
        self.k = k;
        self.centroids = clusters;
        self.models = models;
        Ok(())
    }

    fn predict_entry(&mut self, entry: &LogEntry) -> usize {
        match self.membership(entry) {
            Some(c) => self.models[c].predict_entry(entry),
            None => 0,
        }
    }

    /// Routes by average distance, then replays every entry through the chosen
    /// sub-model and returns the last prediction.
    fn predict_entries(&mut self, entries: &[LogEntry]) -> usize {
        let Some(c) = self.membership_of_all(entries) else {
            return 0;
        };
        let model = &mut self.models[c];
        let mut label = 0;
        for entry in entries {
            label = model.predict_entry(entry);
        }
        label
    }
}

impl StatefulLabelPredictor for ClusteredMarkovModel {
    fn predict_sequence_from_entry(&mut self, entry: &LogEntry, n: usize) -> Vec<usize> {
        match self.membership(entry) {
            Some(c) => self.models[c].predict_sequence_from_entry(entry, n),
            None => vec![0; n],
        }
    }

    fn predict_sequence(&mut self, entries: &[LogEntry], n: usize) -> Vec<usize> {
        match self.membership_of_all(entries) {
            Some(c) => self.models[c].predict_sequence(entries, n),
            None => vec![0; n],
        }
    }

    fn reset_predictions(&mut self) {
        for model in &mut self.models {
            model.reset_predictions();
        }
    }
}
