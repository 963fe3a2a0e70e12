//! Distributed coordinator
//!
//! Connects to one node service per worker, in host-list order, and runs the
//! selection over TCP. The first address becomes worker 1, the second worker 2,
//! and so on; each node loads the shard for the id it is assigned.

use crate::coordinator::{Coordinator, RankSelection, SelectionOutcome};
use crate::distributed::channel::TcpChannel;
use crate::distributed::protocol::{Command, Reply};
use anyhow::{Context, Result};

/// Coordinator for remote node services
pub struct DistributedCoordinator {
    /// Node addresses (host:port), one per worker
    node_addresses: Vec<String>,

    selection: RankSelection,
    seed: Option<u64>,
}

impl DistributedCoordinator {
    /// Create a coordinator for the given nodes
    pub fn new(node_addresses: Vec<String>) -> Result<Self> {
        if node_addresses.is_empty() {
            anyhow::bail!("No nodes specified for coordinator mode");
        }

        Ok(Self {
            node_addresses,
            selection: RankSelection::Median,
            seed: None,
        })
    }

    /// Select a different order statistic
    pub fn with_selection(mut self, selection: RankSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Fix the pivot-selection seed
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Node addresses in worker-id order
    pub fn node_addresses(&self) -> &[String] {
        &self.node_addresses
    }

    /// Connect to every node and run the selection
    pub async fn run(self) -> Result<SelectionOutcome> {
        tracing::info!(
            nodes = self.node_addresses.len(),
            "connecting to node services"
        );

        let mut channels: Vec<TcpChannel<Command, Reply>> =
            Vec::with_capacity(self.node_addresses.len());
        for (i, addr) in self.node_addresses.iter().enumerate() {
            let channel = TcpChannel::connect(addr.as_str())
                .await
                .with_context(|| format!("Failed to connect to {}", addr))?;
            tracing::info!(worker = i + 1, peer = %channel.peer(), "connected");
            channels.push(channel);
        }

        let mut coordinator = Coordinator::new(channels).with_selection(self.selection);
        if let Some(seed) = self.seed {
            coordinator = coordinator.with_seed(seed);
        }
        coordinator.run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_nodes() {
        assert!(DistributedCoordinator::new(Vec::new()).is_err());
    }

    #[test]
    fn test_keeps_host_order() {
        let coordinator = DistributedCoordinator::new(vec![
            "10.0.0.2:7000".to_string(),
            "10.0.0.1:7000".to_string(),
        ])
        .unwrap();
        assert_eq!(coordinator.node_addresses()[0], "10.0.0.2:7000");
    }

    #[tokio::test]
    async fn test_unreachable_node_names_address() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = DistributedCoordinator::new(vec![addr.clone()])
            .unwrap()
            .run()
            .await
            .unwrap_err();
        assert!(err.to_string().contains(&addr));
    }
}
