//! Selection protocol
//!
//! This module defines the messages exchanged between the coordinator and each
//! worker, and the frame codec used when a channel crosses a socket. In-process
//! channels carry the same typed messages without encoding them.
//!
//! # Protocol Version
//!
//! Current version: 1
//!
//! # Message Flow
//!
//! ```text
//! Coordinator                          Worker
//!     |                                   |
//!     |-------- ASSIGN_ID(id) ----------->|   (once)
//!     |<------- READY(shard_len) ---------|
//!     |                                   |
//!     |-------- SAMPLE ------------------>|   (one chosen worker, repeated
//!     |<------- SAMPLE(value | absent) ---|    until a value comes back)
//!     |                                   |
//!     |-------- PIVOT_COUNT(pivot) ------>|   (every worker)
//!     |<------- PIVOT_COUNT(counts) ------|
//!     |                                   |
//!     |-------- FILTER_KEEP_HIGH -------->|   (every worker, one of three)
//!     |-------- FILTER_KEEP_LOW --------->|
//!     |-------- TERMINATE --------------->|
//! ```
//!
//! # Message Framing
//!
//! Each frame is prefixed with a 4-byte length field (little-endian u32):
//!
//! ```text
//! [4 bytes: body length][N bytes: MessagePack body]
//! ```

use crate::error::ChannelError;
use crate::shard::{PivotCounts, WorkerId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version
///
/// Carried in ASSIGN_ID; a worker refuses a coordinator speaking another
/// version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest accepted frame body
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Stable integer identifiers for every message kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ControlCode {
    Sample = 100,
    PivotCount = 200,
    FilterKeepLow = 300,
    FilterKeepHigh = 400,
    Ready = 500,
    Terminate = 600,
    AssignId = 700,
    Failed = 800,
}

impl ControlCode {
    /// Wire name used in logs and diagnostics
    pub fn name(self) -> &'static str {
        match self {
            ControlCode::Sample => "SAMPLE",
            ControlCode::PivotCount => "PIVOT_COUNT",
            ControlCode::FilterKeepLow => "FILTER_KEEP_LOW",
            ControlCode::FilterKeepHigh => "FILTER_KEEP_HIGH",
            ControlCode::Ready => "READY",
            ControlCode::Terminate => "TERMINATE",
            ControlCode::AssignId => "ASSIGN_ID",
            ControlCode::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ControlCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Coordinator → Worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Tell the worker its identity (sent exactly once, first)
    AssignId {
        worker_id: WorkerId,
        protocol_version: u32,
    },

    /// Ask for one uniformly random live value
    Sample,

    /// Ask for counts relative to `pivot`; the worker remembers the pivot for
    /// the filter that follows
    PivotCount { pivot: i64 },

    /// Drop the remembered pivot and every live value below it
    FilterKeepHigh,

    /// Drop the remembered pivot and every live value above it
    FilterKeepLow,

    /// Stop serving
    Terminate,
}

impl Command {
    pub fn code(&self) -> ControlCode {
        match self {
            Command::AssignId { .. } => ControlCode::AssignId,
            Command::Sample => ControlCode::Sample,
            Command::PivotCount { .. } => ControlCode::PivotCount,
            Command::FilterKeepHigh => ControlCode::FilterKeepHigh,
            Command::FilterKeepLow => ControlCode::FilterKeepLow,
            Command::Terminate => ControlCode::Terminate,
        }
    }
}

/// Worker → Coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    /// Shard loaded; serving rounds from now on
    Ready { shard_len: u64 },

    /// Sampled live value, or `None` when the shard is exhausted
    Sample { value: Option<i64> },

    /// Counts relative to the requested pivot
    PivotCount(PivotCounts),

    /// Worker hit a fatal condition and is exiting
    Failed { reason: String },
}

impl Reply {
    pub fn code(&self) -> ControlCode {
        match self {
            Reply::Ready { .. } => ControlCode::Ready,
            Reply::Sample { .. } => ControlCode::Sample,
            Reply::PivotCount(_) => ControlCode::PivotCount,
            Reply::Failed { .. } => ControlCode::Failed,
        }
    }
}

/// Serialize a message to a length-prefixed frame
pub fn encode_frame<T: Serialize>(msg: &T) -> Result<Vec<u8>, ChannelError> {
    let body = rmp_serde::to_vec(msg)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(ChannelError::FrameTooLarge {
            len: body.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut framed = Vec::with_capacity(4 + body.len());
    framed.extend_from_slice(&(body.len() as u32).to_le_bytes());
    framed.extend_from_slice(&body);
    Ok(framed)
}

/// Read one complete frame from a stream
///
/// EOF before any byte of the length prefix means the peer closed the
/// channel. EOF anywhere later is a truncated frame.
pub async fn read_frame<T, S>(stream: &mut S) -> Result<T, ChannelError>
where
    T: DeserializeOwned,
    S: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = stream.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Err(ChannelError::Closed);
            }
            return Err(ChannelError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("frame length cut off after {} bytes", filled),
            )));
        }
        filled += n;
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ChannelError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;

    Ok(rmp_serde::from_slice(&body)?)
}

/// Write one frame to a stream and flush it
pub async fn write_frame<T, S>(stream: &mut S, msg: &T) -> Result<(), ChannelError>
where
    T: Serialize,
    S: AsyncWrite + Unpin,
{
    let framed = encode_frame(msg)?;
    stream.write_all(&framed).await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_pivot_count() {
        let msg = Command::PivotCount { pivot: -1 };

        let bytes = encode_frame(&msg).unwrap();
        let mut reader = &bytes[..];
        let decoded: Command = read_frame(&mut reader).await.unwrap();

        assert!(reader.is_empty());
        assert_eq!(decoded, msg);
    }

    #[tokio::test]
    async fn test_frame_absent_sample() {
        let bytes = encode_frame(&Reply::Sample { value: None }).unwrap();
        let decoded: Reply = read_frame(&mut &bytes[..]).await.unwrap();

        assert_eq!(decoded, Reply::Sample { value: None });
    }

    #[test]
    fn test_frame_length_prefix() {
        let bytes = encode_frame(&Command::Terminate).unwrap();

        assert!(bytes.len() >= 4);
        let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        assert_eq!(bytes.len(), 4 + len);
    }

    #[tokio::test]
    async fn test_read_truncated_body() {
        let bytes = encode_frame(&Reply::Ready { shard_len: 5 }).unwrap();
        let result: Result<Reply, _> = read_frame(&mut &bytes[..bytes.len() - 1]).await;

        match result {
            Err(ChannelError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_truncated_length_prefix() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&[5, 0]).await.unwrap();
        drop(a);

        let result: Result<Command, _> = read_frame(&mut b).await;
        match result {
            Err(ChannelError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_rejects_oversized_prefix() {
        let mut bytes = ((MAX_FRAME_LEN + 1) as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 8]);

        let result: Result<Command, _> = read_frame(&mut &bytes[..]).await;
        assert!(matches!(result, Err(ChannelError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_control_codes_are_stable() {
        assert_eq!(ControlCode::Sample as u32, 100);
        assert_eq!(ControlCode::PivotCount as u32, 200);
        assert_eq!(ControlCode::FilterKeepLow as u32, 300);
        assert_eq!(ControlCode::FilterKeepHigh as u32, 400);
        assert_eq!(ControlCode::Ready as u32, 500);
        assert_eq!(ControlCode::Terminate as u32, 600);
        assert_eq!(ControlCode::AssignId as u32, 700);
        assert_eq!(ControlCode::Failed as u32, 800);
    }

    #[test]
    fn test_message_codes() {
        assert_eq!(Command::FilterKeepHigh.code(), ControlCode::FilterKeepHigh);
        assert_eq!(
            Reply::PivotCount(PivotCounts::default()).code(),
            ControlCode::PivotCount
        );
        assert_eq!(
            Reply::Failed { reason: "x".into() }.code().to_string(),
            "FAILED"
        );
    }

    #[tokio::test]
    async fn test_stream_roundtrip() {
        let (mut a, mut b) = tokio::io::duplex(1024);

        write_frame(&mut a, &Command::Sample).await.unwrap();
        write_frame(&mut a, &Command::PivotCount { pivot: 13 }).await.unwrap();

        let first: Command = read_frame(&mut b).await.unwrap();
        let second: Command = read_frame(&mut b).await.unwrap();
        assert_eq!(first, Command::Sample);
        assert_eq!(second, Command::PivotCount { pivot: 13 });
    }

    #[tokio::test]
    async fn test_stream_eof_is_closed() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);

        let result: Result<Command, _> = read_frame(&mut b).await;
        assert!(matches!(result, Err(ChannelError::Closed)));
    }
}
