//! Global sequence alignment (Needleman-Wunsch) as a cost, lower is more similar.

/// Gap and substitution costs. Matching symbols cost 0, any mismatch 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightMatrix {
    pub gap_cost: f64,
}

impl WeightMatrix {
    pub fn new(gap_cost: f64) -> Self {
        Self { gap_cost }
    }

    pub fn cost<T: PartialEq>(&self, first: &T, second: &T) -> f64 {
        if first == second {
            0.0
        } else {
            1.0
        }
    }
}

impl Default for WeightMatrix {
    fn default() -> Self {
        Self { gap_cost: 0.5 }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeedlemanWunsch {
    weights: WeightMatrix,
}

impl NeedlemanWunsch {
    pub fn new(weights: WeightMatrix) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &WeightMatrix {
        &self.weights
    }

    /// Minimum alignment cost of `first` against `second`.
    ///
    /// Fills the `(|first| + 1) x (|second| + 1)` table row by row, keeping only
    /// the previous row. Border cells cost `gap * (i | j)`, which is `gap * index`
    /// since one index is zero there.
    pub fn align<T: PartialEq>(&self, first: &[T], second: &[T]) -> f64 {
        let gap = self.weights.gap_cost;
        let mut previous: Vec<f64> = (0..=second.len()).map(|j| (j as f64) * gap).collect();
        let mut current = vec![0.0; second.len() + 1];

        for (i, a) in first.iter().enumerate() {
            let i = i + 1;
            current[0] = i as f64 * gap;
            for (j, b) in second.iter().enumerate() {
                let j = j + 1;
                let diagonal = previous[j - 1] + self.weights.cost(a, b);
                let top = previous[j] + gap;
                let left = current[j - 1] + gap;
                current[j] = diagonal.min(top.min(left));
            }
            std::mem::swap(&mut previous, &mut current);
        }
        previous[second.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identical_sequences_cost_nothing() {
        let nw = NeedlemanWunsch::default();
        assert_eq!(nw.align(&["a", "b", "c"], &["a", "b", "c"]), 0.0);
    }

    #[test]
    fn single_mismatch_costs_one() {
        let nw = NeedlemanWunsch::default();
        assert_eq!(nw.align(&["a"], &["b"]), 1.0);
    }

    #[test]
    fn gaps_are_cheaper_than_two_mismatches() {
        let nw = NeedlemanWunsch::default();
        // shift by one: two gaps (0.5 each) beat three mismatches
        assert_eq!(nw.align(&[1, 2, 3], &[2, 3, 4]), 1.0);
        assert_eq!(nw.align::<u8>(&[], &[1, 2, 3, 4]), 2.0);
        assert_eq!(nw.align::<u8>(&[7, 7], &[]), 1.0);
    }

    #[test]
    fn gap_cost_is_configurable() {
        let nw = NeedlemanWunsch::new(WeightMatrix::new(2.0));
        assert_eq!(nw.align(&[1, 2, 3], &[2, 3, 4]), 3.0);
        assert_eq!(nw.weights().gap_cost, 2.0);
    }

    proptest! {
        #[test]
        fn alignment_is_symmetric(
            a in prop::collection::vec(0usize..6, 0..30),
            b in prop::collection::vec(0usize..6, 0..30),
        ) {
            let nw = NeedlemanWunsch::default();
            prop_assert_eq!(nw.align(&a, &b), nw.align(&b, &a));
        }

        #[test]
        fn self_alignment_is_zero(a in prop::collection::vec(0usize..6, 0..50)) {
            prop_assert_eq!(NeedlemanWunsch::default().align(&a, &a), 0.0);
        }
    }
}
