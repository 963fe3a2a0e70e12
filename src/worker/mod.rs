//! Worker state machine
//!
//! A worker owns one shard and answers the coordinator's commands over its
//! channel. It learns its identity from the first message, loads its shard from
//! a [`ShardSource`], acknowledges with READY, and then serves rounds until it
//! is told to terminate.
//!
//! # States
//!
//! ```text
//! AwaitingId --ASSIGN_ID--> Ready --SAMPLE--> Serving --PIVOT_COUNT--> PivotPending
//!                             |                 ^                        |
//!                             |                 +------FILTER_KEEP_*-----+
//!                             +---TERMINATE (from any serving state)---> Terminated
//! ```
//!
//! `Ready` accepts the same round messages as `Serving`.
//! `PivotPending` holds the pivot of the last PIVOT_COUNT. The next message
//! must consume it: FILTER_KEEP_HIGH, FILTER_KEEP_LOW, or TERMINATE. Anything
//! else is a protocol violation and stops the worker.
//!
//! # Example
//!
//! ```
//! use shardmedian::distributed::protocol::{Command, Reply, PROTOCOL_VERSION};
//! use shardmedian::shard::MemoryShardSource;
//! use shardmedian::worker::Worker;
//!
//! let source = MemoryShardSource::from_partitions(vec![vec![3, 8, 15, 2, 9]]);
//! let mut worker = Worker::with_seed(source, 1);
//!
//! let reply = worker.handle(Command::AssignId {
//!     worker_id: 1,
//!     protocol_version: PROTOCOL_VERSION,
//! })?;
//! assert_eq!(reply, Some(Reply::Ready { shard_len: 5 }));
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::distributed::channel::WorkerChannel;
use crate::distributed::protocol::{Command, ControlCode, Reply, PROTOCOL_VERSION};
use crate::error::ProtocolError;
use crate::shard::{Shard, ShardSource, WorkerId};
use anyhow::{Context, Result};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::Serialize;

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for ASSIGN_ID
    AwaitingId,
    /// Shard loaded and READY sent; no round message seen yet
    Ready,
    /// Serving rounds, no pivot armed
    Serving,
    /// PIVOT_COUNT answered; waiting for the filter or TERMINATE
    PivotPending(i64),
    /// TERMINATE received
    Terminated,
}

impl WorkerState {
    /// Short name for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            WorkerState::AwaitingId => "AwaitingId",
            WorkerState::Ready => "Ready",
            WorkerState::Serving => "Serving",
            WorkerState::PivotPending(_) => "PivotPending",
            WorkerState::Terminated => "Terminated",
        }
    }
}

/// What a worker did over its lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    /// Identity assigned by the coordinator
    pub worker_id: WorkerId,
    /// Shard size at load time
    pub initial_len: usize,
    /// Live elements when the worker terminated
    pub live_len: usize,
    /// SAMPLE requests answered
    pub samples: u64,
    /// PIVOT_COUNT requests answered
    pub counts: u64,
    /// Filters applied
    pub filters: u64,
    /// Elements tombstoned across all filters
    pub tombstoned: u64,
}

/// One shard-owning worker
///
/// The worker is transport-agnostic: [`Worker::handle`] is the pure state
/// machine and [`Worker::run`] drives it over any [`WorkerChannel`].
pub struct Worker<S> {
    source: S,
    state: WorkerState,
    shard: Option<Shard>,
    rng: Xoshiro256PlusPlus,
    report: WorkerReport,
}

impl<S: ShardSource> Worker<S> {
    /// Create a worker with an entropy-seeded RNG
    pub fn new(source: S) -> Self {
        Self::with_rng(source, Xoshiro256PlusPlus::from_entropy())
    }

    /// Create a worker with a fixed RNG seed
    ///
    /// Useful for reproducible runs and tests.
    pub fn with_seed(source: S, seed: u64) -> Self {
        Self::with_rng(source, Xoshiro256PlusPlus::seed_from_u64(seed))
    }

    fn with_rng(source: S, rng: Xoshiro256PlusPlus) -> Self {
        Self {
            source,
            state: WorkerState::AwaitingId,
            shard: None,
            rng,
            report: WorkerReport::default(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Identity, once assigned
    pub fn id(&self) -> Option<WorkerId> {
        match self.state {
            WorkerState::AwaitingId => None,
            _ => Some(self.report.worker_id),
        }
    }

    /// Loaded shard, once assigned
    pub fn shard(&self) -> Option<&Shard> {
        self.shard.as_ref()
    }

    /// Apply one command and return the reply to send, if any
    ///
    /// Errors are fatal: the worker must stop serving.
    pub fn handle(&mut self, cmd: Command) -> Result<Option<Reply>> {
        let code = cmd.code();

        match (self.state, cmd) {
            (WorkerState::AwaitingId, Command::AssignId { worker_id, protocol_version }) => {
                if protocol_version != PROTOCOL_VERSION {
                    return Err(ProtocolError::VersionMismatch {
                        coordinator: protocol_version,
                        worker: PROTOCOL_VERSION,
                    }
                    .into());
                }

                let values = self
                    .source
                    .load(worker_id)
                    .with_context(|| format!("Worker {} failed to load its shard", worker_id))?;
                let shard = Shard::new(values);

                self.report.worker_id = worker_id;
                self.report.initial_len = shard.len();
                self.report.live_len = shard.live_len();
                let shard_len = shard.len() as u64;
                self.shard = Some(shard);
                self.state = WorkerState::Ready;

                tracing::debug!(worker = worker_id, shard_len, "shard loaded");
                Ok(Some(Reply::Ready { shard_len }))
            }

            (WorkerState::Ready | WorkerState::Serving, Command::Sample) => {
                let shard = self
                    .shard
                    .as_ref()
                    .context("shard accessed before ASSIGN_ID")?;
                let value = shard.sample(&mut self.rng);
                self.report.samples += 1;
                self.state = WorkerState::Serving;

                tracing::debug!(worker = self.report.worker_id, ?value, "sample");
                Ok(Some(Reply::Sample { value }))
            }

            (WorkerState::Ready | WorkerState::Serving, Command::PivotCount { pivot }) => {
                let counts = self.loaded_shard()?.counts(pivot);
                self.report.counts += 1;
                self.state = WorkerState::PivotPending(pivot);

                tracing::debug!(
                    worker = self.report.worker_id,
                    pivot,
                    greater = counts.greater,
                    equal = counts.equal,
                    "pivot count"
                );
                Ok(Some(Reply::PivotCount(counts)))
            }

            (
                WorkerState::PivotPending(pivot),
                Command::FilterKeepHigh | Command::FilterKeepLow,
            ) => {
                let keep_high = code == ControlCode::FilterKeepHigh;
                let shard = self.loaded_shard_mut()?;
                let dropped = if keep_high {
                    shard.keep_high(pivot)
                } else {
                    shard.keep_low(pivot)
                };
                let live = shard.live_len();

                self.report.filters += 1;
                self.report.tombstoned += dropped as u64;
                self.report.live_len = live;
                self.state = WorkerState::Serving;

                tracing::debug!(
                    worker = self.report.worker_id,
                    %code,
                    pivot,
                    dropped,
                    live,
                    "filter"
                );
                Ok(None)
            }

            (
                WorkerState::Ready | WorkerState::Serving | WorkerState::PivotPending(_),
                Command::Terminate,
            ) => {
                self.state = WorkerState::Terminated;
                tracing::debug!(worker = self.report.worker_id, "terminating");
                Ok(None)
            }

            (
                WorkerState::Ready | WorkerState::Serving,
                Command::FilterKeepHigh | Command::FilterKeepLow,
            ) => Err(ProtocolError::FilterWithoutPivot { got: code }.into()),

            (state, _) => Err(ProtocolError::UnexpectedCommand {
                state: state.name(),
                got: code,
            }
            .into()),
        }
    }

    /// Serve commands from `channel` until TERMINATE
    ///
    /// A fatal error is reported to the coordinator as FAILED (best effort)
    /// before it is returned.
    pub async fn run<C: WorkerChannel>(mut self, mut channel: C) -> Result<WorkerReport> {
        while self.state != WorkerState::Terminated {
            let cmd = channel
                .recv()
                .await
                .with_context(|| format!("{} lost its coordinator channel", self.label()))?;

            match self.handle(cmd) {
                Ok(Some(reply)) => {
                    channel
                        .send(reply)
                        .await
                        .with_context(|| format!("{} failed to send reply", self.label()))?;
                }
                Ok(None) => {}
                Err(e) => {
                    let reason = format!("{:#}", e);
                    tracing::error!("{} stopping: {}", self.label(), reason);
                    let _ = channel.send(Reply::Failed { reason }).await;
                    return Err(e.context(format!("{} aborted", self.label())));
                }
            }
        }

        Ok(self.report)
    }

    /// Report so far
    pub fn report(&self) -> &WorkerReport {
        &self.report
    }

    fn label(&self) -> String {
        match self.id() {
            Some(id) => format!("Worker {}", id),
            None => "Unassigned worker".to_string(),
        }
    }

    fn loaded_shard(&self) -> Result<&Shard> {
        self.shard
            .as_ref()
            .context("shard accessed before ASSIGN_ID")
    }

    fn loaded_shard_mut(&mut self) -> Result<&mut Shard> {
        self.shard
            .as_mut()
            .context("shard accessed before ASSIGN_ID")
    }
}
