//! Error types for shardmedian
//!
//! Two families of failures cross the protocol seams:
//!
//! - [`ChannelError`]: the transport under a worker channel failed (closed,
//!   IO, framing, codec).
//! - [`ProtocolError`]: a message arrived that the receiving role cannot accept
//!   in its current state, or a run-level precondition does not hold.
//!
//! Both are fatal. Application code wraps them in `anyhow` with context naming
//! the worker or role, so callers can still downcast to the typed error.

use crate::distributed::protocol::ControlCode;
use crate::shard::WorkerId;
use thiserror::Error;

/// Transport failure on a single worker channel
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Peer hung up (task ended or connection closed)
    #[error("channel closed by peer")]
    Closed,

    /// Socket IO failed
    #[error("channel IO failed: {0}")]
    Io(#[from] std::io::Error),

    /// Frame length prefix exceeds the accepted maximum
    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// Message could not be encoded
    #[error("failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Message could not be decoded
    #[error("failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Protocol violation or broken run precondition
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Worker received a message its current state does not accept
    #[error("worker in state {state} cannot accept {got}")]
    UnexpectedCommand {
        state: &'static str,
        got: ControlCode,
    },

    /// Filter arrived without a preceding pivot count
    #[error("{got} received without a preceding PIVOT_COUNT")]
    FilterWithoutPivot { got: ControlCode },

    /// Coordinator received a reply it did not ask for
    #[error("worker {worker} replied {got}, expected {expected}")]
    UnexpectedReply {
        worker: WorkerId,
        expected: ControlCode,
        got: ControlCode,
    },

    /// Worker reported a fatal condition instead of answering
    #[error("worker {worker} failed: {reason}")]
    WorkerFailed { worker: WorkerId, reason: String },

    /// Coordinator and worker speak different wire versions
    #[error("protocol version mismatch: coordinator={coordinator}, worker={worker}")]
    VersionMismatch { coordinator: u32, worker: u32 },

    /// Every worker answered SAMPLE with "absent"
    #[error("no live elements remain on any of {workers} workers")]
    NoLiveElements { workers: usize },

    /// Requested rank does not exist in the dataset
    #[error("rank {rank} out of range for {total} elements")]
    RankOutOfRange { rank: u64, total: u64 },

    /// Coordinator started without any worker channels
    #[error("no workers registered")]
    NoWorkers,
}
