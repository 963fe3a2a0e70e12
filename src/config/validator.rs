//! Configuration validation

use super::*;
use crate::config::cli::ExecutionMode;
use anyhow::Result;

/// Validate complete configuration for the given mode
pub fn validate_config(config: &Config, mode: ExecutionMode) -> Result<()> {
    validate_shards(&config.shards)?;
    validate_cluster(&config.cluster, mode)?;
    validate_output(&config.output)?;
    Ok(())
}

/// Validate shard configuration
pub fn validate_shards(shards: &ShardConfig) -> Result<()> {
    if !shards.file_pattern.contains(ID_PLACEHOLDER) {
        anyhow::bail!(
            "shards.file_pattern '{}' must contain {}",
            shards.file_pattern,
            ID_PLACEHOLDER
        );
    }

    if shards.shard_size == Some(0) {
        anyhow::bail!("shards.shard_size must be at least 1");
    }

    Ok(())
}

/// Validate cluster configuration
pub fn validate_cluster(cluster: &ClusterConfig, mode: ExecutionMode) -> Result<()> {
    match mode {
        ExecutionMode::Local => {
            if cluster.workers == 0 {
                anyhow::bail!("cluster.workers must be at least 1");
            }

            // Each worker is a task holding its whole shard in memory
            if cluster.workers > 4096 {
                tracing::warn!(
                    workers = cluster.workers,
                    "very high worker count for local mode"
                );
            }
        }
        ExecutionMode::Coordinator => {
            if cluster.nodes.is_empty() {
                anyhow::bail!(
                    "coordinator mode requires at least one node (--host-list or cluster.nodes)"
                );
            }

            let mut seen = std::collections::HashSet::new();
            for node in &cluster.nodes {
                if !seen.insert(node.as_str()) {
                    anyhow::bail!("node address {} is listed twice", node);
                }
            }
        }
        ExecutionMode::Service => {}
    }

    Ok(())
}

/// Validate output configuration
pub fn validate_output(output: &OutputConfig) -> Result<()> {
    if output.json_path.is_some() && output.format != OutputFormat::Json {
        anyhow::bail!("output.json_path requires output.format = \"json\"");
    }

    Ok(())
}
