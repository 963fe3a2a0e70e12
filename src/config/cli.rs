//! CLI argument parsing using clap

use crate::coordinator::RankSelection;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Local mode (default) - coordinator and workers in one process
    Local,
    /// Coordinator mode - drive remote node services
    Coordinator,
    /// Service mode - host one worker for a remote coordinator
    Service,
}

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Text,
    Json,
}

/// shardmedian - distributed median over sharded integer data
#[derive(Parser, Debug)]
#[command(name = "shardmedian")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: local, coordinator, or service
    #[arg(long, value_enum, default_value = "local")]
    pub mode: ExecutionMode,

    /// TOML configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of workers (local mode)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Directory holding shard files
    #[arg(long)]
    pub shard_dir: Option<PathBuf>,

    /// Shard file name pattern; {id} is replaced by the worker id
    #[arg(long)]
    pub file_pattern: Option<String>,

    /// Require exactly this many values per shard
    #[arg(long)]
    pub shard_size: Option<usize>,

    /// Order statistic: "median" or N (N elements above the answer)
    #[arg(long, value_parser = parse_rank)]
    pub rank: Option<RankSelection>,

    /// RNG seed for reproducible runs
    #[arg(long, env = "SHARDMEDIAN_SEED")]
    pub seed: Option<u64>,

    /// Comma-separated node addresses for coordinator mode (e.g., "10.0.1.10:7400,10.0.1.11:7400")
    #[arg(long)]
    pub host_list: Option<String>,

    /// Port for the node service to listen on (service mode only)
    #[arg(long, default_value = "7400")]
    pub listen_port: u16,

    /// Report format
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Write the JSON report to this file
    #[arg(long, value_name = "FILE")]
    pub json_output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// Parse a `--rank` value
pub fn parse_rank(s: &str) -> Result<RankSelection, String> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("median") {
        return Ok(RankSelection::Median);
    }
    s.parse::<u64>()
        .map(RankSelection::FromTop)
        .map_err(|_| format!("invalid rank '{}': expected \"median\" or a non-negative integer", s))
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workers == Some(0) {
            anyhow::bail!("workers must be at least 1");
        }

        if self.mode != ExecutionMode::Coordinator && self.host_list.is_some() {
            anyhow::bail!("--host-list is only valid in coordinator mode");
        }

        if self.mode == ExecutionMode::Service && self.json_output.is_some() {
            anyhow::bail!("--json-output is not available in service mode");
        }

        Ok(())
    }
}
