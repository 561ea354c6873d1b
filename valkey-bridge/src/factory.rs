//! Connection factory
//!
//! Produces connections for the configured topology and owns the per-node
//! client cache used for node probes. The cache is an explicit map keyed
//! by node address, owned here and invalidated explicitly when a node
//! leaves the cluster; nothing about it is shared ambiently.

use std::collections::HashMap;
use tracing::debug;
use valkey_bridge_core::{
    config::{ConnectionConfig, TopologyMode},
    error::{ValkeyError, ValkeyResult},
    value::Value,
};

use crate::adapter::StandaloneAdapter;
use crate::cluster_adapter::ClusterAdapter;
use crate::cluster_client::ClusterTcpClient;
use crate::cluster_connection::ClusterConnection;
use crate::connection::Connection;
use crate::driver::NativeClient;
use crate::protocol::command_args;
use crate::tcp::TcpClient;

/// Explicit cache of per-node clients keyed by node address
#[derive(Default)]
pub struct NodeClientCache {
    clients: HashMap<String, TcpClient>,
}

impl NodeClientCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached client for a node, connecting when absent
    ///
    /// # Errors
    ///
    /// Returns the connection error when the node is unreachable.
    pub async fn get_or_connect(
        &mut self,
        host: &str,
        port: u16,
        config: &ConnectionConfig,
    ) -> ValkeyResult<&mut TcpClient> {
        let addr = format!("{host}:{port}");
        if !self.clients.contains_key(&addr) {
            debug!("caching node client for {addr}");
            let client = TcpClient::connect(host, port, config.clone()).await?;
            self.clients.insert(addr.clone(), client);
        }
        self.clients
            .get_mut(&addr)
            .ok_or_else(|| ValkeyError::Connection(format!("No client for {addr}")))
    }

    /// Drop the cached client for a node
    ///
    /// Called when the node is removed from the deployment.
    pub fn invalidate(&mut self, host: &str, port: u16) {
        let addr = format!("{host}:{port}");
        if self.clients.remove(&addr).is_some() {
            debug!("invalidated node client for {addr}");
        }
    }

    /// Number of cached clients
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Check whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Standalone connection type produced by the factory
pub type StandaloneConnection = Connection<StandaloneAdapter>;

/// Produces connections and owns the node-client cache
///
/// The factory itself is thin: connection state lives on the connections
/// it hands out, one per logical unit of work.
pub struct ConnectionFactory {
    config: ConnectionConfig,
    node_cache: NodeClientCache,
}

impl ConnectionFactory {
    /// Create a factory for the given configuration
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            node_cache: NodeClientCache::new(),
        }
    }

    /// The factory's configuration
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Whether this factory produces cluster connections
    #[must_use]
    pub fn is_cluster(&self) -> bool {
        self.config.topology_mode == TopologyMode::Cluster
    }

    /// Open a standalone connection
    ///
    /// # Errors
    ///
    /// Returns a configuration error without endpoints, or the connection
    /// error of the dial.
    pub async fn standalone_connection(&self) -> ValkeyResult<StandaloneConnection> {
        let endpoints = self.config.parse_endpoints();
        let (host, port) = endpoints
            .first()
            .ok_or_else(|| ValkeyError::Config("No endpoints specified".to_string()))?;

        let client = TcpClient::connect(host, *port, self.config.clone()).await?;
        Ok(Connection::new(
            StandaloneAdapter::new(Box::new(client)),
            self.config.clone(),
        ))
    }

    /// Open a cluster connection
    ///
    /// # Errors
    ///
    /// Returns the bootstrap error when no seed node is reachable.
    pub async fn cluster_connection(&self) -> ValkeyResult<ClusterConnection> {
        let client = ClusterTcpClient::connect(self.config.clone()).await?;
        Ok(ClusterConnection::new(
            ClusterAdapter::new(Box::new(client)),
            self.config.clone(),
        ))
    }

    /// Probe whether a node answers PING, using the cached node client
    pub async fn is_active(&mut self, host: &str, port: u16) -> bool {
        let reply = match self
            .node_cache
            .get_or_connect(host, port, &self.config)
            .await
        {
            Ok(client) => client.request(command_args("PING", Vec::<bytes::Bytes>::new())).await,
            Err(_) => return false,
        };

        match reply {
            Ok(Value::Simple(s)) => s == "PONG",
            Ok(_) => false,
            Err(_) => {
                // A dead cached client must not poison future probes
                self.node_cache.invalidate(host, port);
                false
            }
        }
    }

    /// Drop the cached client of a removed node
    pub fn invalidate_node(&mut self, host: &str, port: u16) {
        self.node_cache.invalidate(host, port);
    }
}
