use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{LabelError, Result};
use crate::types::SplitData;

pub const DEFAULT_SEED: u64 = 42;
const SPLIT_SUM_TOLERANCE: f64 = 1e-6;

/// Train/val/test fractions. Only constructible when they sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRatios {
    train: f64,
    val: f64,
    test: f64,
}

impl SplitRatios {
    pub fn new(train: f64, val: f64, test: f64) -> Result<Self> {
        let sum = train + val + test;
        let in_range = [train, val, test].iter().all(|f| (0.0..=1.0).contains(f));
        if !in_range || (sum - 1.0).abs() >= SPLIT_SUM_TOLERANCE {
            return Err(LabelError::InvalidSplit {
                train,
                val,
                test,
                sum,
            });
        }
        Ok(Self { train, val, test })
    }

    pub fn train(&self) -> f64 {
        self.train
    }

    pub fn val(&self) -> f64 {
        self.val
    }

    pub fn test(&self) -> f64 {
        self.test
    }
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.8,
            val: 0.15,
            test: 0.05,
        }
    }
}

/// Shuffle `items` with a seeded RNG and cut them into train, val and test.
///
/// Train takes `floor(n * train)` items, val the next `floor(n * val)`, and
/// test whatever remains. The same input order, ratios and seed always give
/// the same partition.
pub fn plan_split<T: Clone>(items: &[T], ratios: &SplitRatios, seed: u64) -> SplitData<T> {
    let mut shuffled = items.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let n = shuffled.len();
    let n_train = (n as f64 * ratios.train).floor() as usize;
    let n_val = ((n as f64 * ratios.val).floor() as usize).min(n - n_train);

    let test = shuffled.split_off(n_train + n_val);
    let val = shuffled.split_off(n_train);

    SplitData {
        train: shuffled,
        val,
        test,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ratios_must_sum_to_one() {
        assert!(SplitRatios::new(0.8, 0.15, 0.05).is_ok());
        assert!(SplitRatios::new(0.7, 0.2, 0.1).is_ok());
        assert!(matches!(
            SplitRatios::new(0.8, 0.2, 0.1),
            Err(LabelError::InvalidSplit { .. })
        ));
        assert!(SplitRatios::new(1.2, -0.1, -0.1).is_err());
    }

    #[test]
    fn test_split_sizes_and_determinism() {
        let items: Vec<usize> = (0..100).collect();
        let ratios = SplitRatios::new(0.8, 0.15, 0.05).unwrap();
        let first = plan_split(&items, &ratios, DEFAULT_SEED);
        let second = plan_split(&items, &ratios, DEFAULT_SEED);

        assert_eq!(first, second);
        assert_eq!(first.train.len(), 80);
        assert_eq!(first.val.len(), 15);
        assert_eq!(first.test.len(), 5);
    }

    #[test]
    fn test_split_is_a_partition() {
        let items: Vec<usize> = (0..37).collect();
        let split = plan_split(&items, &SplitRatios::default(), 7);

        let mut all: Vec<usize> = split
            .train
            .iter()
            .chain(&split.val)
            .chain(&split.test)
            .copied()
            .collect();
        let unique: HashSet<usize> = all.iter().copied().collect();
        assert_eq!(unique.len(), all.len());
        all.sort_unstable();
        assert_eq!(all, items);
    }

    #[test]
    fn test_remainder_goes_to_test() {
        let items: Vec<usize> = (0..10).collect();
        let split = plan_split(&items, &SplitRatios::default(), DEFAULT_SEED);
        assert_eq!(split.train.len(), 8);
        assert_eq!(split.val.len(), 1);
        assert_eq!(split.test.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        let items: Vec<usize> = Vec::new();
        let split = plan_split(&items, &SplitRatios::default(), DEFAULT_SEED);
        assert!(split.is_empty());
    }
}
