//! Selection coordinator
//!
//! The coordinator owns one channel per worker and drives the distributed
//! quickselect until the requested order statistic is certified:
//!
//! 1. **Startup**: send ASSIGN_ID to every worker, collect READY and shard sizes
//! 2. **Pivot**: ask a random worker for a random live value (retrying on
//!    exhausted workers)
//! 3. **Count**: send PIVOT_COUNT to every worker and aggregate the replies
//! 4. **Decide**: terminate, keep the high side, or keep the low side and
//!    discount `k` (see [`rank`])
//!
//! The coordinator never sees shard contents, only counts and sampled values.
//! It is transport-agnostic; [`local`] wires it to in-process worker tasks and
//! [`crate::distributed`] to remote node services.

pub mod local;
pub mod rank;

use crate::distributed::channel::CoordinatorChannel;
use crate::distributed::protocol::{Command, ControlCode, Reply, PROTOCOL_VERSION};
use crate::error::ProtocolError;
use crate::shard::{PivotCounts, WorkerId};
use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::Serialize;
use std::collections::BTreeMap;

pub use rank::{Decision, RankSelection, RankTarget};

/// One completed round, kept for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundSummary {
    /// 1-based round number
    pub round: u32,
    /// Worker whose sample became the pivot
    pub pivot_worker: WorkerId,
    /// Pivot value
    pub pivot: i64,
    /// SAMPLE requests sent this round (more than one when workers were empty)
    pub sample_requests: u32,
    /// Aggregated counts across all workers
    pub counts: PivotCounts,
    /// Rank target when the round started
    pub k: u64,
    /// What the coordinator decided
    pub decision: Decision,
}

/// Result of a completed selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionOutcome {
    /// The selected value
    pub value: i64,
    /// Initial rank target (elements strictly above the answer)
    pub rank: u64,
    /// Total elements across all shards at startup
    pub total: u64,
    /// Shard size reported by each worker
    pub shard_sizes: BTreeMap<WorkerId, u64>,
    /// Round history, in order
    pub rounds: Vec<RoundSummary>,
}

impl SelectionOutcome {
    /// Number of workers that took part
    pub fn workers(&self) -> usize {
        self.shard_sizes.len()
    }
}

/// Drives rounds over a fixed set of worker channels
pub struct Coordinator<C> {
    workers: BTreeMap<WorkerId, C>,
    selection: RankSelection,
    rng: Xoshiro256PlusPlus,
}

impl<C: CoordinatorChannel> Coordinator<C> {
    /// Create a coordinator that assigns ids `1..=N` to `channels` in order
    pub fn new(channels: Vec<C>) -> Self {
        let workers = channels
            .into_iter()
            .enumerate()
            .map(|(i, channel)| (i as WorkerId + 1, channel))
            .collect();

        Self {
            workers,
            selection: RankSelection::Median,
            rng: Xoshiro256PlusPlus::from_entropy(),
        }
    }

    /// Select a different order statistic
    pub fn with_selection(mut self, selection: RankSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Use a fixed RNG seed for pivot worker selection
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        self
    }

    /// Number of worker channels
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Run startup and rounds until the answer is found
    ///
    /// On success every worker has been sent TERMINATE. On error the channels
    /// are dropped, which closes them for any worker still waiting.
    pub async fn run(mut self) -> Result<SelectionOutcome> {
        if self.workers.is_empty() {
            return Err(ProtocolError::NoWorkers.into());
        }

        let shard_sizes = self.startup().await?;
        let total: u64 = shard_sizes.values().sum();
        let mut target = RankTarget::new(self.selection.resolve(total)?);
        let rank = target.get();

        tracing::info!(
            workers = self.workers.len(),
            total,
            k = rank,
            "all workers ready"
        );

        let mut rounds = Vec::new();
        loop {
            let round = rounds.len() as u32 + 1;
            let (pivot_worker, pivot, sample_requests) = self.select_pivot().await?;
            let counts = self.count(pivot).await?;

            let k = target.get();
            debug_assert!(
                k < counts.live,
                "rank target {} not below live total {}",
                k,
                counts.live
            );
            let decision = target.advance(&counts);

            tracing::info!(
                round,
                pivot,
                pivot_worker,
                m = counts.greater,
                e = counts.equal,
                live = counts.live,
                k,
                ?decision,
                "round complete"
            );

            rounds.push(RoundSummary {
                round,
                pivot_worker,
                pivot,
                sample_requests,
                counts,
                k,
                decision,
            });

            self.broadcast(decision.command()).await?;

            if decision == Decision::Found {
                tracing::info!(value = pivot, rounds = rounds.len(), "selection complete");
                return Ok(SelectionOutcome {
                    value: pivot,
                    rank,
                    total,
                    shard_sizes,
                    rounds,
                });
            }
        }
    }

    /// Assign identities and wait for every READY
    async fn startup(&mut self) -> Result<BTreeMap<WorkerId, u64>> {
        let ids: Vec<WorkerId> = self.workers.keys().copied().collect();

        for &id in &ids {
            self.send_to(
                id,
                Command::AssignId {
                    worker_id: id,
                    protocol_version: PROTOCOL_VERSION,
                },
            )
            .await?;
        }

        let mut shard_sizes = BTreeMap::new();
        for &id in &ids {
            match self.recv_from(id, ControlCode::Ready).await? {
                Reply::Ready { shard_len } => {
                    tracing::debug!(worker = id, shard_len, "worker ready");
                    shard_sizes.insert(id, shard_len);
                }
                other => {
                    return Err(ProtocolError::UnexpectedReply {
                        worker: id,
                        expected: ControlCode::Ready,
                        got: other.code(),
                    })
                    .context(format!("Unexpected response from worker {} during startup", id));
                }
            }
        }

        Ok(shard_sizes)
    }

    /// Sample random workers until one returns a live value
    ///
    /// Returns the sampling worker, the pivot, and the number of SAMPLE
    /// requests made. Each worker is asked at most once per round.
    async fn select_pivot(&mut self) -> Result<(WorkerId, i64, u32)> {
        let mut candidates: Vec<WorkerId> = self.workers.keys().copied().collect();
        let mut requests = 0;

        while !candidates.is_empty() {
            let id = candidates.swap_remove(self.rng.gen_range(0..candidates.len()));
            requests += 1;

            self.send_to(id, Command::Sample).await?;
            match self.recv_from(id, ControlCode::Sample).await? {
                Reply::Sample { value: Some(pivot) } => {
                    tracing::debug!(worker = id, pivot, "pivot sampled");
                    return Ok((id, pivot, requests));
                }
                Reply::Sample { value: None } => {
                    tracing::debug!(worker = id, "worker exhausted, resampling");
                }
                other => {
                    return Err(ProtocolError::UnexpectedReply {
                        worker: id,
                        expected: ControlCode::Sample,
                        got: other.code(),
                    }
                    .into());
                }
            }
        }

        Err(ProtocolError::NoLiveElements {
            workers: self.workers.len(),
        }
        .into())
    }

    /// Ask every worker for its counts relative to `pivot` and sum them
    async fn count(&mut self, pivot: i64) -> Result<PivotCounts> {
        let ids: Vec<WorkerId> = self.workers.keys().copied().collect();
        let mut total = PivotCounts::default();

        for id in ids {
            self.send_to(id, Command::PivotCount { pivot }).await?;
            match self.recv_from(id, ControlCode::PivotCount).await? {
                Reply::PivotCount(counts) => {
                    tracing::debug!(
                        worker = id,
                        greater = counts.greater,
                        equal = counts.equal,
                        "count received"
                    );
                    total = total.merge(counts);
                }
                other => {
                    return Err(ProtocolError::UnexpectedReply {
                        worker: id,
                        expected: ControlCode::PivotCount,
                        got: other.code(),
                    }
                    .into());
                }
            }
        }

        Ok(total)
    }

    /// Send the same command to every worker
    async fn broadcast(&mut self, cmd: Command) -> Result<()> {
        let ids: Vec<WorkerId> = self.workers.keys().copied().collect();
        for id in ids {
            self.send_to(id, cmd.clone()).await?;
        }
        Ok(())
    }

    async fn send_to(&mut self, id: WorkerId, cmd: Command) -> Result<()> {
        let code = cmd.code();
        let channel = self
            .workers
            .get_mut(&id)
            .with_context(|| format!("No channel for worker {}", id))?;

        channel
            .send(cmd)
            .await
            .with_context(|| format!("Failed to send {} to worker {}", code, id))
    }

    /// Receive one reply, turning FAILED into an error
    async fn recv_from(&mut self, id: WorkerId, expected: ControlCode) -> Result<Reply> {
        let channel = self
            .workers
            .get_mut(&id)
            .with_context(|| format!("No channel for worker {}", id))?;

        let reply = channel
            .recv()
            .await
            .with_context(|| format!("Worker {} did not reply to {}", id, expected))?;

        match reply {
            Reply::Failed { reason } => {
                Err(ProtocolError::WorkerFailed { worker: id, reason }.into())
            }
            reply => Ok(reply),
        }
    }
}
