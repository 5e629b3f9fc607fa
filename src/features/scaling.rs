//! Log-wide feature scaling helpers.

/// Maps values of a known `[min, max]` range into `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxNormalizer {
    pub min: f64,
    pub max: f64,
}

impl MinMaxNormalizer {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Fit bounds over the given values; `None` when empty
    pub fn fit<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        let mut iter = values.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), x| (lo.min(x), hi.max(x)));
        Some(Self { min, max })
    }

    /// A constant feature (zero range) scales to 0.0.
    pub fn scale(&self, x: f64) -> f64 {
        let range = self.max - self.min;
        if range == 0.0 {
            return 0.0;
        }
        ((x - self.min) / range).clamp(0.0, 1.0)
    }

    pub fn revert(&self, x: f64) -> f64 {
        x * (self.max - self.min) + self.min
    }
}

/// Z-score transform with population standard deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Standardizer {
    pub mean: f64,
    pub std_dev: f64,
}

impl Standardizer {
    pub fn fit(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            mean,
            std_dev: var.sqrt(),
        })
    }

    pub fn scale(&self, x: f64) -> f64 {
        if self.std_dev == 0.0 {
            return 0.0;
        }
        (x - self.mean) / self.std_dev
    }
}
