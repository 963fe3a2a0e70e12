//! In-process cluster
//!
//! Runs every worker as a tokio task connected to the coordinator through a
//! [`local_pair`] of channels. Workers share nothing but the read-only shard
//! source; each one learns its identity from the coordinator.

use super::{Coordinator, RankSelection, SelectionOutcome};
use crate::distributed::channel::local_pair;
use crate::shard::ShardSource;
use crate::worker::{Worker, WorkerReport};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Outcome of a local run plus what each worker did
#[derive(Debug, Clone)]
pub struct LocalRun {
    pub outcome: SelectionOutcome,
    /// Worker reports ordered by worker id
    pub reports: Vec<WorkerReport>,
}

/// Options for an in-process run
#[derive(Debug, Clone, Copy)]
pub struct LocalOptions {
    /// Number of worker tasks
    pub workers: usize,
    /// Which order statistic to select
    pub selection: RankSelection,
    /// Seed for the coordinator and (derived) worker RNGs; entropy when `None`
    pub seed: Option<u64>,
}

impl Default for LocalOptions {
    fn default() -> Self {
        Self {
            workers: 5,
            selection: RankSelection::Median,
            seed: None,
        }
    }
}

/// Derive a distinct per-worker seed from the run seed
fn worker_seed(seed: u64, index: usize) -> u64 {
    seed ^ 0x9E37_79B9_7F4A_7C15u64.wrapping_mul(index as u64 + 1)
}

/// Spawn workers, run the coordinator, and join everything
///
/// Worker errors take precedence over a successful coordinator result. When
/// the coordinator itself fails, worker errors that follow from the closed
/// channels are logged and the coordinator's error is returned.
pub async fn run_local<S>(source: S, options: LocalOptions) -> Result<LocalRun>
where
    S: ShardSource + 'static,
{
    if options.workers == 0 {
        anyhow::bail!("At least one worker is required");
    }

    let source = Arc::new(source);
    let mut channels = Vec::with_capacity(options.workers);
    let mut handles = Vec::with_capacity(options.workers);

    for index in 0..options.workers {
        let (coordinator_end, worker_end) = local_pair();
        let worker = match options.seed {
            Some(seed) => Worker::with_seed(Arc::clone(&source), worker_seed(seed, index)),
            None => Worker::new(Arc::clone(&source)),
        };
        handles.push(tokio::spawn(worker.run(worker_end)));
        channels.push(coordinator_end);
    }

    tracing::debug!(workers = options.workers, "spawned worker tasks");

    let mut coordinator = Coordinator::new(channels).with_selection(options.selection);
    if let Some(seed) = options.seed {
        coordinator = coordinator.with_seed(seed);
    }
    let result = coordinator.run().await;

    let mut reports = Vec::with_capacity(handles.len());
    let mut worker_error = None;
    for (index, handle) in handles.into_iter().enumerate() {
        let joined = handle
            .await
            .with_context(|| format!("Worker task {} panicked", index + 1))?;

        match joined {
            Ok(report) => reports.push(report),
            Err(e) if result.is_ok() => {
                worker_error.get_or_insert(e);
            }
            Err(e) => tracing::warn!("worker task {} exited: {:#}", index + 1, e),
        }
    }

    let outcome = result?;
    if let Some(e) = worker_error {
        return Err(e);
    }

    reports.sort_by_key(|report| report.worker_id);
    Ok(LocalRun { outcome, reports })
}
