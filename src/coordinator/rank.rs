//! Rank target and per-round decision
//!
//! `k` is the number of live elements that must be strictly greater than the
//! answer. Each round compares the aggregated pivot counts against `k`:
//!
//! | condition          | meaning                   | action                          |
//! |--------------------|---------------------------|---------------------------------|
//! | `m <= k < m + e`   | pivot has rank `k`        | TERMINATE                       |
//! | `m > k`            | answer is above the pivot | FILTER_KEEP_HIGH, `k` kept      |
//! | `m + e <= k`       | answer is below the pivot | FILTER_KEEP_LOW, `k -= m + e`   |
//!
//! where `m` counts live elements above the pivot and `e` those equal to it.
//! With distinct values `e == 1` and the first row is exactly `m == k`.
//!
//! Neither filter keeps the pivot's own value: a filter is only sent when the
//! answer is strictly on one side of it. Every non-terminal round therefore
//! removes at least the `e >= 1` copies of the pivot, so a run finishes within
//! `total` rounds.

use crate::distributed::protocol::Command;
use crate::error::ProtocolError;
use crate::shard::PivotCounts;
use serde::{Deserialize, Serialize};

/// Which order statistic to select
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankSelection {
    /// `floor(total / 2)` elements above the answer
    #[default]
    Median,
    /// Exactly this many elements above the answer (0 selects the maximum)
    FromTop(u64),
}

impl RankSelection {
    /// Resolve to a concrete `k` for a dataset of `total` elements
    pub fn resolve(self, total: u64) -> Result<u64, ProtocolError> {
        let rank = match self {
            RankSelection::Median => total / 2,
            RankSelection::FromTop(k) => k,
        };
        if rank >= total {
            return Err(ProtocolError::RankOutOfRange { rank, total });
        }
        Ok(rank)
    }
}

/// Outcome of comparing one round's counts with `k`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Found,
    KeepHigh,
    KeepLow,
}

impl Decision {
    /// Command broadcast to every worker for this decision
    pub fn command(self) -> Command {
        match self {
            Decision::Found => Command::Terminate,
            Decision::KeepHigh => Command::FilterKeepHigh,
            Decision::KeepLow => Command::FilterKeepLow,
        }
    }
}

/// Coordinator-owned rank target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankTarget {
    k: u64,
}

impl RankTarget {
    pub fn new(k: u64) -> Self {
        Self { k }
    }

    /// Current `k`
    pub fn get(&self) -> u64 {
        self.k
    }

    /// Decide the round without changing `k`
    pub fn decide(&self, counts: &PivotCounts) -> Decision {
        let m = counts.greater;
        if m <= self.k && self.k < m + counts.equal {
            Decision::Found
        } else if m > self.k {
            Decision::KeepHigh
        } else {
            Decision::KeepLow
        }
    }

    /// Decide the round and discount the dropped elements above the answer
    pub fn advance(&mut self, counts: &PivotCounts) -> Decision {
        let decision = self.decide(counts);
        if decision == Decision::KeepLow {
            // KeepLow implies m + e <= k, so this never underflows
            self.k -= counts.greater + counts.equal;
        }
        decision
    }
}
