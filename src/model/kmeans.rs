//! k-means over entry feature vectors.

use crate::config::{seeded_rng, ClusteringConfig};
use crate::data::LogEntry;
use crate::error::{Result, SimError};
use crate::features::FeatureVector;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

/// A centroid and the indices of the entries assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    centroid: FeatureVector,
    members: Vec<usize>,
}

impl Cluster {
    pub fn new(seed: &LogEntry) -> Self {
        Self {
            centroid: seed.features(),
            members: Vec::new(),
        }
    }

    pub fn centroid(&self) -> &FeatureVector {
        &self.centroid
    }

    /// Indices into the entries the clustering was built from
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Cloned member entries, in training order
    pub fn member_entries(&self, entries: &[LogEntry]) -> Vec<LogEntry> {
        self.members
            .iter()
            .filter_map(|&i| entries.get(i).cloned())
            .collect()
    }

    pub fn distance_to_centroid(&self, entry: &LogEntry) -> f64 {
        self.centroid.distance(&entry.features())
    }

    pub fn distance_to(&self, features: &FeatureVector) -> f64 {
        self.centroid.distance(features)
    }

    /// Centroid becomes the per-dimension mean of the members.
    ///
    /// An empty cluster keeps its previous centroid instead of being reset, so
    /// it can still attract entries in the next iteration.
    pub fn calculate_new_centroid(&mut self, features: &[FeatureVector]) {
        if let Some(mean) = FeatureVector::mean(self.members.iter().filter_map(|&i| features.get(i))) {
            self.centroid = mean;
        }
    }

    /// Sum of squared member distances to the centroid
    pub fn squared_error(&self, features: &[FeatureVector]) -> f64 {
        self.members
            .iter()
            .filter_map(|&i| features.get(i))
            .map(|f| self.centroid.distance(f).powi(2))
            .sum()
    }
}

/// Index of the nearest cluster; the first one wins on ties.
pub fn nearest_cluster(clusters: &[Cluster], features: &FeatureVector) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, c) in clusters.iter().enumerate() {
        let d = c.distance_to(features);
        match best {
            Some((_, min)) if d >= min => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}

pub struct KMeansClusterBuilder {
    k: usize,
    iterations: usize,
    entries: Vec<LogEntry>,
    features: Vec<FeatureVector>,
    rng: StdRng,
    best: Option<(f64, Vec<Cluster>)>,
}

impl KMeansClusterBuilder {
    pub fn new(entries: &[LogEntry], k: usize, iterations: usize, seed: Option<u64>) -> Result<Self> {
        if k < 1 {
            return Err(SimError::IllegalNumberOfClusters { requested: k });
        }
        if entries.is_empty() {
            return Err(SimError::EmptyLog);
        }
        Ok(Self {
            k,
            iterations,
            features: entries.iter().map(LogEntry::features).collect(),
            entries: entries.to_vec(),
            rng: seeded_rng(seed),
            best: None,
        })
    }

    pub fn from_config(entries: &[LogEntry], k: usize, config: &ClusteringConfig) -> Result<Self> {
        Self::new(entries, k, config.iterations, config.seed)
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn features(&self) -> &[FeatureVector] {
        &self.features
    }

    /// One k-means run from `k` randomly drawn entries.
    fn build_clustering(&mut self) -> Vec<Cluster> {
        let n = self.entries.len();
        let mut clusters: Vec<Cluster> = (0..self.k)
            .map(|_| Cluster::new(&self.entries[self.rng.gen_range(0..n)]))
            .collect();
        let mut assignment: Vec<Option<usize>> = vec![None; n];
        let mut changed = true;
        let mut iteration = 0;

        while changed && iteration < self.iterations {
            changed = false;
            for (i, f) in self.features.iter().enumerate() {
                let nearest = nearest_cluster(&clusters, f);
                if assignment[i] != nearest {
                    assignment[i] = nearest;
                    changed = true;
                }
            }
            for c in clusters.iter_mut() {
                c.members.clear();
            }
            for (i, a) in assignment.iter().enumerate() {
                if let Some(c) = a {
                    clusters[*c].members.push(i);
                }
            }
            for c in clusters.iter_mut() {
                c.calculate_new_centroid(&self.features);
            }
            iteration += 1;
        }
        debug!(k = self.k, iterations = iteration, converged = !changed, "k-means run finished");
        clusters
    }

    /// `(Σ squared member distances + Σ centroid distance to global mean) / k`
    pub fn weighted_variance(&self, clusters: &[Cluster]) -> f64 {
        let Some(mean) = FeatureVector::mean(&self.features) else {
            return 0.0;
        };
        let weight = 1.0 / self.k as f64;
        let within: f64 = clusters.iter().map(|c| c.squared_error(&self.features)).sum();
        let between: f64 = clusters.iter().map(|c| c.distance_to(&mean)).sum();
        within * weight + between * weight
    }

    /// Best of `attempts` runs (at least one), lowest weighted variance wins.
    /// Keeps the best clustering across calls.
    pub fn calculate_best_clustering(&mut self, attempts: usize) -> (f64, Vec<Cluster>) {
        for _ in 0..attempts.max(1) {
            let clustering = self.build_clustering();
            let quality = self.weighted_variance(&clustering);
            let better = match &self.best {
                Some((best, _)) => quality < *best,
                None => true,
            };
            if better {
                self.best = Some((quality, clustering));
            }
        }
        self.best.clone().unwrap_or((f64::MAX, Vec::new()))
    }
}
