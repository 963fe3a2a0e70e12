//! Distributed mode
//!
//! Runs each worker on its own node and the coordinator elsewhere, connected by
//! TCP:
//!
//! - **Coordinator**: connects to every node, assigns ids, drives the rounds
//! - **Node service**: hosts one worker and its shard
//!
//! # Modules
//!
//! - `protocol`: message definitions and framing
//! - `channel`: the transport abstraction shared with local mode
//! - `node_service`: node side
//! - `coordinator`: coordinator side

pub mod channel;
pub mod coordinator;
pub mod node_service;
pub mod protocol;

pub use channel::{local_pair, Channel, LocalChannel, TcpChannel};
pub use coordinator::DistributedCoordinator;
pub use node_service::NodeService;
pub use protocol::{Command, ControlCode, Reply, PROTOCOL_VERSION};
