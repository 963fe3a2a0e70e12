//! TOML configuration file parsing

use super::*;
use crate::config::cli::{Cli, FormatArg};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Load the file named by `--config` (or defaults) and apply CLI overrides
pub fn load_config(cli: &Cli) -> Result<Config> {
    let config = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => Config::default(),
    };
    merge_cli_with_config(cli, config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    if let Some(rank) = cli.rank {
        config.selection.rank = rank;
    }
    if let Some(seed) = cli.seed {
        config.selection.seed = Some(seed);
    }

    if let Some(ref dir) = cli.shard_dir {
        config.shards.dir = dir.clone();
    }
    if let Some(ref pattern) = cli.file_pattern {
        config.shards.file_pattern = pattern.clone();
    }
    if let Some(size) = cli.shard_size {
        config.shards.shard_size = Some(size);
    }

    if let Some(workers) = cli.workers {
        config.cluster.workers = workers;
    }
    if let Some(ref hosts) = cli.host_list {
        config.cluster.nodes = parse_host_list(hosts)?;
    }

    if let Some(format) = cli.format {
        config.output.format = match format {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        };
    }
    if let Some(ref path) = cli.json_output {
        config.output.json_path = Some(path.clone());
        // A JSON file implies JSON output
        config.output.format = OutputFormat::Json;
    }

    Ok(config)
}

/// Split a comma-separated host list, dropping blanks
pub fn parse_host_list(s: &str) -> Result<Vec<String>> {
    let hosts: Vec<String> = s
        .split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect();

    if hosts.is_empty() {
        anyhow::bail!("Host list '{}' contains no addresses", s);
    }
    for host in &hosts {
        if !host.contains(':') {
            anyhow::bail!(
                "Node address '{}' is missing a port (expected host:port)",
                host
            );
        }
    }

    Ok(hosts)
}
