//! Node service
//!
//! Hosts one worker on a remote machine. The service listens on a TCP port,
//! accepts a single coordinator connection, and serves the worker protocol on
//! it until TERMINATE (or a fatal error). The shard is loaded only after the
//! coordinator assigns an id, so the same binary and data directory can be
//! deployed to every node.

use crate::distributed::channel::TcpChannel;
use crate::distributed::protocol::{Command, Reply};
use crate::shard::ShardSource;
use crate::worker::{Worker, WorkerReport};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::net::{TcpListener, ToSocketAddrs};

/// Node service
pub struct NodeService<S> {
    listener: TcpListener,

    /// Node identifier (hostname) for diagnostics
    node_id: String,

    source: S,
    seed: Option<u64>,
}

impl<S: ShardSource> NodeService<S> {
    /// Bind the listening socket
    pub async fn bind<A: ToSocketAddrs>(addr: A, source: S) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .context("Failed to bind node service")?;

        Ok(Self {
            listener,
            node_id: get_node_id(),
            source,
            seed: None,
        })
    }

    /// Fix the worker's sampling seed
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read node service address")
    }

    /// Node identifier
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Accept one coordinator and serve it to completion
    pub async fn run(self) -> Result<WorkerReport> {
        tracing::info!(
            node = %self.node_id,
            addr = %self.local_addr()?,
            "node service waiting for coordinator"
        );

        let (stream, peer) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        tracing::info!(%peer, "coordinator connected");

        let channel: TcpChannel<Reply, Command> =
            TcpChannel::new(stream).context("Failed to configure coordinator connection")?;

        let worker = match self.seed {
            Some(seed) => Worker::with_seed(self.source, seed),
            None => Worker::new(self.source),
        };
        let report = worker.run(channel).await?;

        tracing::info!(
            worker = report.worker_id,
            initial = report.initial_len,
            live = report.live_len,
            "node service finished"
        );
        Ok(report)
    }
}

/// Hostname, or "unknown" when it cannot be read
fn get_node_id() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
