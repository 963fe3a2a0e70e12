//! shardmedian - distributed median selection over sharded integer data
//!
//! A coordinator finds the median (or any order statistic) of a dataset split
//! across N workers without ever gathering the data. Each round it samples a
//! random pivot from a random worker, asks every worker how many of its live
//! elements are above and equal to that pivot, and tells them which side to
//! keep. Workers tombstone discarded elements instead of moving data.
//!
//! # Architecture
//!
//! - **Worker**: owns one shard, answers SAMPLE / PIVOT_COUNT, applies filters
//! - **Coordinator**: owns the rank target and drives rounds to completion
//! - **Channels**: in-process (tokio mpsc) or TCP (length-prefixed MessagePack)
//! - **Modes**: local tasks, or a coordinator plus remote node services

pub mod config;
pub mod coordinator;
pub mod distributed;
pub mod error;
pub mod output;
pub mod shard;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{Coordinator, RankSelection, SelectionOutcome};
pub use error::{ChannelError, ProtocolError};
pub use worker::Worker;

/// Result type used throughout shardmedian
pub type Result<T> = anyhow::Result<T>;
