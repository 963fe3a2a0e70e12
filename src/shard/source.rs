//! Shard sources
//!
//! A shard source hands a worker its initial data once the coordinator has
//! told it who it is. Loading is not retried: an unreadable or malformed source
//! is fatal for the whole run.

use super::WorkerId;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Placeholder replaced by the worker id in file patterns
pub const ID_PLACEHOLDER: &str = "{id}";

/// Provides each worker's initial shard
pub trait ShardSource: Send + Sync {
    /// Load the shard for `worker`
    fn load(&self, worker: WorkerId) -> Result<Vec<i64>>;
}

impl<T: ShardSource + ?Sized> ShardSource for Arc<T> {
    fn load(&self, worker: WorkerId) -> Result<Vec<i64>> {
        (**self).load(worker)
    }
}

/// Reads whitespace-separated integers from one file per worker
///
/// The file name comes from a pattern such as `input_{id}.txt`, resolved
/// relative to a data directory.
#[derive(Debug, Clone)]
pub struct FileShardSource {
    dir: PathBuf,
    file_pattern: String,
    shard_size: Option<usize>,
}

impl FileShardSource {
    /// Create a source reading `dir/file_pattern`
    pub fn new(dir: impl Into<PathBuf>, file_pattern: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file_pattern: file_pattern.into(),
            shard_size: None,
        }
    }

    /// Require every shard to contain exactly `size` values
    pub fn with_shard_size(mut self, size: usize) -> Self {
        self.shard_size = Some(size);
        self
    }

    /// Path of the file backing `worker`'s shard
    pub fn path_for(&self, worker: WorkerId) -> PathBuf {
        let name = self.file_pattern.replace(ID_PLACEHOLDER, &worker.to_string());
        self.dir.join(name)
    }
}

impl ShardSource for FileShardSource {
    fn load(&self, worker: WorkerId) -> Result<Vec<i64>> {
        let path = self.path_for(worker);
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read shard file: {}", path.display()))?;

        let values = parse_shard(&contents)
            .with_context(|| format!("Failed to parse shard file: {}", path.display()))?;

        if let Some(expected) = self.shard_size {
            if values.len() != expected {
                anyhow::bail!(
                    "Shard file {} holds {} values, expected {}",
                    path.display(),
                    values.len(),
                    expected
                );
            }
        }

        Ok(values)
    }
}

/// Parse whitespace-separated integers
pub fn parse_shard(contents: &str) -> Result<Vec<i64>> {
    contents
        .split_whitespace()
        .enumerate()
        .map(|(i, token)| {
            token
                .parse::<i64>()
                .with_context(|| format!("Invalid integer {:?} at position {}", token, i))
        })
        .collect()
}

/// In-memory shards keyed by worker id
#[derive(Debug, Clone, Default)]
pub struct MemoryShardSource {
    shards: HashMap<WorkerId, Vec<i64>>,
}

impl MemoryShardSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign ids `1..=N` to the given partitions in order
    pub fn from_partitions(partitions: Vec<Vec<i64>>) -> Self {
        let shards = partitions
            .into_iter()
            .enumerate()
            .map(|(i, values)| (i as WorkerId + 1, values))
            .collect();
        Self { shards }
    }

    /// Set the shard for `worker`
    pub fn insert(&mut self, worker: WorkerId, values: Vec<i64>) {
        self.shards.insert(worker, values);
    }

    /// Number of shards held
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// True when no shard has been inserted
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}

impl ShardSource for MemoryShardSource {
    fn load(&self, worker: WorkerId) -> Result<Vec<i64>> {
        self.shards
            .get(&worker)
            .cloned()
            .with_context(|| format!("No shard registered for worker {}", worker))
    }
}

/// Write `values` as a shard file, one line, space separated
pub fn write_shard_file(path: &Path, values: &[i64]) -> Result<()> {
    let line = values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    fs::write(path, format!("{}\n", line))
        .with_context(|| format!("Failed to write shard file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_source_reads_pattern() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("input_3.txt"), "17 10 24\n16 13\n").unwrap();

        let source = FileShardSource::new(dir.path(), "input_{id}.txt");
        assert_eq!(source.load(3).unwrap(), vec![17, 10, 24, 16, 13]);
    }

    #[test]
    fn test_file_source_missing_file() {
        let dir = TempDir::new().unwrap();
        let source = FileShardSource::new(dir.path(), "input_{id}.txt");

        let err = source.load(1).unwrap_err();
        assert!(format!("{:#}", err).contains("input_1.txt"));
    }

    #[test]
    fn test_file_source_malformed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("input_1.txt"), "1 2 three 4").unwrap();

        let source = FileShardSource::new(dir.path(), "input_{id}.txt");
        let err = format!("{:#}", source.load(1).unwrap_err());
        assert!(err.contains("three"), "unexpected error: {}", err);
    }

    #[test]
    fn test_file_source_size_check() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("input_1.txt"), "1 2 3 4").unwrap();

        let source = FileShardSource::new(dir.path(), "input_{id}.txt").with_shard_size(5);
        let err = format!("{:#}", source.load(1).unwrap_err());
        assert!(err.contains("expected 5"), "unexpected error: {}", err);
    }

    #[test]
    fn test_file_source_empty_shard() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("input_2.txt"), "\n").unwrap();

        let source = FileShardSource::new(dir.path(), "input_{id}.txt");
        assert!(source.load(2).unwrap().is_empty());
    }

    #[test]
    fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let source = FileShardSource::new(dir.path(), "shard-{id}.dat");
        write_shard_file(&source.path_for(4), &[-5, 0, 12]).unwrap();

        assert_eq!(source.load(4).unwrap(), vec![-5, 0, 12]);
    }

    #[test]
    fn test_memory_source_ids_start_at_one() {
        let source = MemoryShardSource::from_partitions(vec![vec![1, 2], vec![3]]);

        assert_eq!(source.len(), 2);
        assert_eq!(source.load(1).unwrap(), vec![1, 2]);
        assert_eq!(source.load(2).unwrap(), vec![3]);
        assert!(source.load(3).is_err());
    }
}
