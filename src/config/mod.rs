//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//! Every section is optional in the file; CLI flags override file values.

pub mod cli;
pub mod toml;
pub mod validator;

use crate::coordinator::RankSelection;
use crate::shard::source::{FileShardSource, ID_PLACEHOLDER};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Complete run configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub shards: ShardConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// What to select and how to seed the randomness
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Order statistic to select
    #[serde(default)]
    pub rank: RankSelection,
    /// RNG seed; entropy when absent
    pub seed: Option<u64>,
}

/// Where worker shards come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardConfig {
    /// Directory holding shard files
    #[serde(default = "default_shard_dir")]
    pub dir: PathBuf,
    /// File name pattern; `{id}` is replaced by the worker id
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,
    /// Required element count per shard
    pub shard_size: Option<usize>,
}

fn default_shard_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_file_pattern() -> String {
    format!("input_{}.txt", ID_PLACEHOLDER)
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            dir: default_shard_dir(),
            file_pattern: default_file_pattern(),
            shard_size: None,
        }
    }
}

impl ShardConfig {
    /// Build the file-backed shard source this section describes
    pub fn source(&self) -> FileShardSource {
        let source = FileShardSource::new(&self.dir, &self.file_pattern);
        match self.shard_size {
            Some(size) => source.with_shard_size(size),
            None => source,
        }
    }
}

/// Cluster layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Worker count in local mode
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Node service addresses in coordinator mode, in worker-id order
    #[serde(default)]
    pub nodes: Vec<String>,
}

fn default_workers() -> usize {
    5
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            nodes: Vec::new(),
        }
    }
}

/// Result reporting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Write the JSON report here instead of stdout
    pub json_path: Option<PathBuf>,
}

/// Report format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

// Display trait implementations

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Selection: {}", self.selection)?;
        writeln!(f, "  Shards: {}", self.shards)?;
        writeln!(f, "  Cluster: {}", self.cluster)?;
        writeln!(f, "  Output: {}", self.output)?;
        Ok(())
    }
}

impl fmt::Display for SelectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rank {
            RankSelection::Median => write!(f, "median")?,
            RankSelection::FromTop(k) => write!(f, "{} from top", k)?,
        }
        match self.seed {
            Some(seed) => write!(f, ", seed={}", seed),
            None => write!(f, ", seed=entropy"),
        }
    }
}

impl fmt::Display for ShardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir.join(&self.file_pattern).display())?;
        if let Some(size) = self.shard_size {
            write!(f, " ({} values each)", size)?;
        }
        Ok(())
    }
}

impl fmt::Display for ClusterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nodes.is_empty() {
            write!(f, "{} local workers", self.workers)
        } else {
            write!(f, "{} nodes [{}]", self.nodes.len(), self.nodes.join(", "))
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl fmt::Display for OutputConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format)?;
        if let Some(ref path) = self.json_path {
            write!(f, " -> {}", path.display())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_classic_layout() {
        let config = Config::default();
        assert_eq!(config.cluster.workers, 5);
        assert_eq!(config.shards.file_pattern, "input_{id}.txt");
        assert_eq!(config.selection.rank, RankSelection::Median);
        assert_eq!(config.output.format, OutputFormat::Text);
    }

    #[test]
    fn test_shard_source_uses_pattern() {
        let shards = ShardConfig {
            dir: PathBuf::from("/data"),
            file_pattern: "part-{id}.txt".to_string(),
            shard_size: Some(5),
        };
        assert_eq!(
            shards.source().path_for(3),
            PathBuf::from("/data/part-3.txt")
        );
    }

    #[test]
    fn test_display_mentions_sections() {
        let text = Config::default().to_string();
        assert!(text.contains("median"));
        assert!(text.contains("5 local workers"));
    }
}
