//! JSON output formatting

use crate::coordinator::{Decision, SelectionOutcome};
use crate::worker::WorkerReport;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Top-level JSON document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    /// RFC 3339 generation time
    pub generated_at: String,
    pub version: String,
    /// `local` or `coordinator`
    pub mode: String,
    pub result: JsonResult,
    pub rounds: Vec<JsonRound>,
    /// Per-worker detail (local mode only)
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub workers: Vec<WorkerJson>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResult {
    pub value: i64,
    pub rank: u64,
    pub total: u64,
    pub workers: usize,
    pub shard_sizes: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRound {
    pub round: u32,
    pub pivot_worker: u32,
    pub pivot: i64,
    pub sample_requests: u32,
    pub greater: u64,
    pub equal: u64,
    pub live: u64,
    pub k: u64,
    pub decision: Decision,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerJson {
    pub worker_id: u32,
    pub initial_len: usize,
    pub live_len: usize,
    pub samples: u64,
    pub counts: u64,
    pub filters: u64,
    pub tombstoned: u64,
}

impl From<&WorkerReport> for WorkerJson {
    fn from(report: &WorkerReport) -> Self {
        Self {
            worker_id: report.worker_id,
            initial_len: report.initial_len,
            live_len: report.live_len,
            samples: report.samples,
            counts: report.counts,
            filters: report.filters,
            tombstoned: report.tombstoned,
        }
    }
}

impl JsonReport {
    /// Build the document for one completed selection
    pub fn new(mode: &str, outcome: &SelectionOutcome, reports: &[WorkerReport]) -> Self {
        let rounds = outcome
            .rounds
            .iter()
            .map(|r| JsonRound {
                round: r.round,
                pivot_worker: r.pivot_worker,
                pivot: r.pivot,
                sample_requests: r.sample_requests,
                greater: r.counts.greater,
                equal: r.counts.equal,
                live: r.counts.live,
                k: r.k,
                decision: r.decision,
            })
            .collect();

        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode: mode.to_string(),
            result: JsonResult {
                value: outcome.value,
                rank: outcome.rank,
                total: outcome.total,
                workers: outcome.workers(),
                shard_sizes: outcome.shard_sizes.values().copied().collect(),
            },
            rounds,
            workers: reports.iter().map(WorkerJson::from).collect(),
        }
    }
}

/// Write JSON output to file
pub fn write_json_output(output_path: &Path, report: &JsonReport, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output: {}", output_path.display()))?;
    let writer = BufWriter::new(file);

    if pretty {
        serde_json::to_writer_pretty(writer, report)?;
    } else {
        serde_json::to_writer(writer, report)?;
    }

    Ok(())
}

/// Print pretty JSON to stdout
pub fn print_json(report: &JsonReport) -> Result<()> {
    let text = serde_json::to_string_pretty(report).context("Failed to serialize JSON report")?;
    println!("{}", text);
    Ok(())
}
