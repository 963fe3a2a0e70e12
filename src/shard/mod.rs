//! Worker-owned shard storage
//!
//! A [`Shard`] is one worker's private slice of the dataset. Elements are never
//! physically removed: filters mark them as tombstoned so positions stay
//! stable, and every later sample, count, or filter skips them. Tombstones only
//! accumulate; nothing is ever revived within a run.
//!
//! # Example
//!
//! ```
//! use shardmedian::shard::Shard;
//!
//! let mut shard = Shard::new(vec![3, 8, 15, 2, 9]);
//! assert_eq!(shard.counts(8).greater, 2);
//!
//! // Keep only what lies strictly above the pivot
//! shard.keep_high(8);
//! assert_eq!(shard.live_len(), 2);
//! ```

pub mod source;

use rand::Rng;
use serde::{Deserialize, Serialize};

pub use source::{FileShardSource, MemoryShardSource, ShardSource};

/// Worker identity, assigned by the coordinator in `[1, N]`
pub type WorkerId = u32;

/// Per-worker answer to a pivot count
///
/// `greater` is the quantity the selection decision is driven by; `equal` lets
/// the coordinator stop on duplicated pivot values, and `live` feeds the
/// round history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotCounts {
    /// Live elements strictly greater than the pivot
    pub greater: u64,
    /// Live elements equal to the pivot
    pub equal: u64,
    /// All live elements
    pub live: u64,
}

impl PivotCounts {
    /// Sum two workers' counts
    pub fn merge(self, other: PivotCounts) -> PivotCounts {
        PivotCounts {
            greater: self.greater + other.greater,
            equal: self.equal + other.equal,
            live: self.live + other.live,
        }
    }
}

/// One worker's shard with tombstoned removal
#[derive(Debug, Clone)]
pub struct Shard {
    values: Vec<i64>,
    removed: Vec<bool>,
    live: usize,
}

impl Shard {
    /// Create a shard with every element live
    pub fn new(values: Vec<i64>) -> Self {
        let live = values.len();
        Self {
            removed: vec![false; live],
            values,
            live,
        }
    }

    /// Number of slots, live or tombstoned
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the shard was created empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of live elements
    pub fn live_len(&self) -> usize {
        self.live
    }

    /// True once every element is tombstoned
    pub fn is_exhausted(&self) -> bool {
        self.live == 0
    }

    /// Iterate live values in slot order
    pub fn live_values(&self) -> impl Iterator<Item = i64> + '_ {
        self.values
            .iter()
            .zip(&self.removed)
            .filter(|(_, &removed)| !removed)
            .map(|(&value, _)| value)
    }

    /// Draw a uniformly random live value
    ///
    /// Returns `None` when the shard is exhausted. Draws that land on a
    /// tombstoned slot are retried; after `len()` misses the draw falls back to
    /// picking the n-th live slot directly, which keeps the distribution uniform
    /// without spinning on a mostly-tombstoned shard.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<i64> {
        if self.is_exhausted() {
            return None;
        }

        for _ in 0..self.values.len() {
            let idx = rng.gen_range(0..self.values.len());
            if !self.removed[idx] {
                return Some(self.values[idx]);
            }
        }

        let nth = rng.gen_range(0..self.live);
        self.live_values().nth(nth)
    }

    /// Count live elements relative to `pivot`
    pub fn counts(&self, pivot: i64) -> PivotCounts {
        let mut counts = PivotCounts {
            live: self.live as u64,
            ..PivotCounts::default()
        };
        for value in self.live_values() {
            if value > pivot {
                counts.greater += 1;
            } else if value == pivot {
                counts.equal += 1;
            }
        }
        counts
    }

    /// Tombstone every live element less than or equal to `pivot`
    ///
    /// Only sent once the answer is known to lie strictly above the pivot, so
    /// the pivot's own copies go too. Returns the number newly tombstoned.
    pub fn keep_high(&mut self, pivot: i64) -> usize {
        self.tombstone_where(|value| value <= pivot)
    }

    /// Tombstone every live element greater than or equal to `pivot`
    ///
    /// Returns the number of elements newly tombstoned.
    pub fn keep_low(&mut self, pivot: i64) -> usize {
        self.tombstone_where(|value| value >= pivot)
    }

    fn tombstone_where(&mut self, mut drop: impl FnMut(i64) -> bool) -> usize {
        let mut dropped = 0;
        for (value, removed) in self.values.iter().zip(self.removed.iter_mut()) {
            if !*removed && drop(*value) {
                *removed = true;
                dropped += 1;
            }
        }
        self.live -= dropped;
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn live(shard: &Shard) -> Vec<i64> {
        shard.live_values().collect()
    }

    #[test]
    fn test_counts_strictly_greater_and_equal() {
        let shard = Shard::new(vec![3, 8, 15, 2, 9, 8]);
        let counts = shard.counts(8);

        assert_eq!(counts.greater, 2);
        assert_eq!(counts.equal, 2);
        assert_eq!(counts.live, 6);
    }

    #[test]
    fn test_keep_high_drops_pivot_and_below() {
        let mut shard = Shard::new(vec![3, 8, 15, 2, 9, 8]);
        let dropped = shard.keep_high(8);

        assert_eq!(dropped, 4);
        assert_eq!(live(&shard), vec![15, 9]);
        assert_eq!(shard.len(), 6);
    }

    #[test]
    fn test_keep_low_drops_pivot_and_above() {
        let mut shard = Shard::new(vec![3, 8, 15, 2, 9]);
        let dropped = shard.keep_low(8);

        assert_eq!(dropped, 3);
        assert_eq!(live(&shard), vec![3, 2]);
    }

    #[test]
    fn test_filter_at_extreme_pivot_still_removes_it() {
        let mut max_side = Shard::new(vec![1, 2, 3]);
        assert_eq!(max_side.keep_low(3), 1);
        assert_eq!(live(&max_side), vec![1, 2]);

        let mut min_side = Shard::new(vec![1, 2, 3]);
        assert_eq!(min_side.keep_high(1), 1);
        assert_eq!(live(&min_side), vec![2, 3]);
    }

    #[test]
    fn test_keep_low_is_idempotent() {
        let mut once = Shard::new(vec![5, 1, 7, 7, 3, 9]);
        let mut twice = once.clone();

        once.keep_low(7);
        twice.keep_low(7);
        assert_eq!(twice.keep_low(7), 0);

        assert_eq!(live(&once), live(&twice));
        assert_eq!(once.live_len(), twice.live_len());
    }

    #[test]
    fn test_keep_high_is_idempotent() {
        let mut once = Shard::new(vec![5, 1, 7, 7, 3, 9]);
        let mut twice = once.clone();

        once.keep_high(5);
        twice.keep_high(5);
        assert_eq!(twice.keep_high(5), 0);

        assert_eq!(live(&once), vec![7, 7, 9]);
        assert_eq!(live(&once), live(&twice));
        assert_eq!(once.live_len(), twice.live_len());
    }

    #[test]
    fn test_tombstones_are_monotone() {
        let mut shard = Shard::new(vec![10, 20, 30, 40, 50]);
        shard.keep_high(20);
        assert_eq!(shard.live_len(), 3);

        // A later filter in the other direction never revives 10 or 20
        shard.keep_low(50);
        assert_eq!(live(&shard), vec![30, 40]);

        shard.keep_high(0);
        assert_eq!(shard.live_len(), 2);
    }

    #[test]
    fn test_counts_skip_tombstoned() {
        let mut shard = Shard::new(vec![1, 2, 3, 4, 5]);
        shard.keep_low(4);

        let counts = shard.counts(0);
        assert_eq!(counts.greater, 3);
        assert_eq!(counts.live, 3);
    }

    #[test]
    fn test_sample_never_returns_tombstoned() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let mut shard = Shard::new((0..100).collect());
        shard.keep_high(89);

        for _ in 0..1000 {
            let value = shard.sample(&mut rng).unwrap();
            assert!(value >= 90, "sampled tombstoned value {}", value);
        }
    }

    #[test]
    fn test_sample_exhausted_is_absent() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let mut shard = Shard::new(vec![4, 5, 6]);
        shard.keep_high(10);

        assert!(shard.is_exhausted());
        assert_eq!(shard.sample(&mut rng), None);
        assert_eq!(Shard::new(vec![]).sample(&mut rng), None);
    }

    #[test]
    fn test_sample_accepts_negative_one() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let shard = Shard::new(vec![-1]);
        assert_eq!(shard.sample(&mut rng), Some(-1));
    }

    #[test]
    fn test_sample_covers_all_live_values() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let mut shard = Shard::new((0..1000).collect());
        // Four survivors among 1000 slots
        shard.keep_high(995);

        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..200 {
            seen.insert(shard.sample(&mut rng).unwrap());
        }
        assert_eq!(
            seen.into_iter().collect::<Vec<_>>(),
            vec![996, 997, 998, 999]
        );
    }

    #[test]
    fn test_pivot_counts_merge() {
        let a = PivotCounts {
            greater: 1,
            equal: 2,
            live: 5,
        };
        let b = PivotCounts {
            greater: 3,
            equal: 0,
            live: 4,
        };
        let merged = a.merge(b);

        assert_eq!(merged.greater, 4);
        assert_eq!(merged.equal, 2);
        assert_eq!(merged.live, 9);
    }
}
