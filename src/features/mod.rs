//! Per-entry feature vectors: time of day, day of year, weather, one-hot weather kind.

mod scaling;

pub use scaling::{MinMaxNormalizer, Standardizer};

use serde::{Deserialize, Serialize};

/// Scalable numeric features of a log entry. Order matches [`FeatureVector`] layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    TimeOfDay,
    DayOfYear,
    RealTemperature,
    FeltTemperature,
    Pressure,
    Humidity,
    WindSpeed,
    Cloudiness,
}

impl Feature {
    pub const ALL: [Feature; 8] = [
        Feature::TimeOfDay,
        Feature::DayOfYear,
        Feature::RealTemperature,
        Feature::FeltTemperature,
        Feature::Pressure,
        Feature::Humidity,
        Feature::WindSpeed,
        Feature::Cloudiness,
    ];

    /// Humidity and cloudiness arrive as fractions and are never rescaled.
    pub fn is_min_max_scaled(self) -> bool {
        !matches!(self, Feature::Humidity | Feature::Cloudiness)
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Variable-length feature vector. Comparisons pad the shorter side with zeros.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn zeros(dim: usize) -> Self {
        Self {
            values: vec![0.0; dim],
        }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Component `i`, or 0.0 past the end
    pub fn get(&self, i: usize) -> f64 {
        self.values.get(i).copied().unwrap_or(0.0)
    }

    /// Pad or truncate to dim
    pub fn resized(&self, dim: usize) -> Self {
        let mut out = vec![0.0f64; dim];
        let copy = self.values.len().min(dim);
        out[..copy].copy_from_slice(&self.values[..copy]);
        Self { values: out }
    }

    /// Euclidean distance over the zero-padded union of both dimensions
    pub fn distance(&self, other: &FeatureVector) -> f64 {
        let dim = self.dim().max(other.dim());
        (0..dim)
            .map(|i| {
                let d = self.get(i) - other.get(i);
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Per-dimension arithmetic mean; `None` for an empty input
    pub fn mean<'a, I>(vectors: I) -> Option<FeatureVector>
    where
        I: IntoIterator<Item = &'a FeatureVector>,
    {
        let mut sums: Vec<f64> = Vec::new();
        let mut count = 0usize;
        for v in vectors {
            if v.dim() > sums.len() {
                sums.resize(v.dim(), 0.0);
            }
            for (s, x) in sums.iter_mut().zip(&v.values) {
                *s += x;
            }
            count += 1;
        }
        if count == 0 {
            return None;
        }
        let n = count as f64;
        Some(FeatureVector::new(sums.into_iter().map(|s| s / n).collect()))
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_pads_shorter_vector() {
        let a = FeatureVector::new(vec![3.0]);
        let b = FeatureVector::new(vec![0.0, 4.0]);
        assert!((a.distance(&b) - 5.0).abs() < 1e-12);
        assert!((b.distance(&a) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn mean_of_mixed_lengths() {
        let a = FeatureVector::new(vec![1.0, 2.0]);
        let b = FeatureVector::new(vec![3.0]);
        let m = FeatureVector::mean([&a, &b]).unwrap();
        assert_eq!(m.values, vec![2.0, 1.0]);
        assert!(FeatureVector::mean(std::iter::empty()).is_none());
    }

    #[test]
    fn resized_truncates_and_pads() {
        let v = FeatureVector::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(v.resized(2).values, vec![1.0, 2.0]);
        assert_eq!(v.resized(4).values, vec![1.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn humidity_and_cloudiness_are_not_min_max_scaled() {
        let scaled: Vec<_> = Feature::ALL
            .iter()
            .filter(|f| f.is_min_max_scaled())
            .collect();
        assert_eq!(scaled.len(), 6);
        assert_eq!(Feature::Cloudiness.index(), 7);
    }
}
