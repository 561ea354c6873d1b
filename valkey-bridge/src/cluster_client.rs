//! Cluster TCP native client
//!
//! A cluster-aware [`NativeClusterClient`] over per-node [`TcpClient`]s.
//! Maintains its own routing state: a slot table refreshed from
//! `CLUSTER SLOTS`, bootstrapped from the configured seed endpoints and
//! re-read when the server answers with a MOVED redirect. Default routing
//! follows the table in [`crate::routing`]; explicit routes bypass it.
//!
//! Single-node replies are filed through [`ClusterValue::classify`], which
//! is where the shape-based misclassification of map replies originates;
//! see [`crate::cluster_adapter`] for the repair.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use valkey_bridge_core::{
    config::ConnectionConfig,
    error::{ValkeyError, ValkeyResult},
    value::Value,
};

use crate::driver::{ClusterValue, NativeClient, NativeClusterClient, Route};
use crate::protocol::command_args;
use crate::routing::{command_label, default_route, DefaultRoute};
use crate::tcp::TcpClient;
use crate::topology::{calculate_slot, parse_cluster_slots, ClusterTopology};

/// Cluster client over per-node TCP connections
pub struct ClusterTcpClient {
    config: ConnectionConfig,
    seeds: Vec<(String, u16)>,
    connections: HashMap<String, TcpClient>,
    topology: ClusterTopology,
}

impl ClusterTcpClient {
    /// Bootstrap the client from the configured seed endpoints
    ///
    /// # Errors
    ///
    /// Returns a connection error when no seed is reachable, or a
    /// cluster-state error when the slot table cannot be read.
    pub async fn connect(config: ConnectionConfig) -> ValkeyResult<Self> {
        let seeds = config.parse_endpoints();
        if seeds.is_empty() {
            return Err(ValkeyError::Config("No endpoints specified".to_string()));
        }

        let mut client = Self {
            config,
            seeds,
            connections: HashMap::new(),
            topology: ClusterTopology::default(),
        };
        client.refresh_topology().await?;
        Ok(client)
    }

    /// The client's current view of the cluster
    #[must_use]
    pub fn topology(&self) -> &ClusterTopology {
        &self.topology
    }

    /// Re-read the slot table, trying known masters first and falling back
    /// to the seeds
    pub async fn refresh_topology(&mut self) -> ValkeyResult<()> {
        let mut candidates: Vec<(String, u16)> = self
            .topology
            .active_master_nodes()
            .iter()
            .map(|node| (node.host.clone(), node.port))
            .collect();
        candidates.extend(self.seeds.iter().cloned());

        let mut last_error = None;
        for (host, port) in candidates {
            let addr = format!("{host}:{port}");
            let frame = command_args("CLUSTER", [Bytes::from_static(b"SLOTS")]);
            match self.request_at(&addr, frame).await {
                Ok(reply) => match parse_cluster_slots(reply) {
                    Ok(topology) => {
                        info!(nodes = topology.nodes().len(), "refreshed cluster topology");
                        self.topology = topology;
                        return Ok(());
                    }
                    Err(err) => last_error = Some(err),
                },
                Err(err) => {
                    warn!("topology refresh via {addr} failed: {err}");
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ValkeyError::ClusterState("No node answered the topology refresh".to_string())
        }))
    }

    async fn request_at(&mut self, addr: &str, args: Vec<Bytes>) -> ValkeyResult<Value> {
        if !self.connections.contains_key(addr) {
            let (host, port) = addr.rsplit_once(':').ok_or_else(|| {
                ValkeyError::Config(format!("Malformed node address: {addr}"))
            })?;
            let port = port
                .parse::<u16>()
                .map_err(|_| ValkeyError::Config(format!("Malformed node address: {addr}")))?;
            let client = TcpClient::connect(host, port, self.config.clone()).await?;
            self.connections.insert(addr.to_string(), client);
        }

        let client = self.connections.get_mut(addr).ok_or_else(|| {
            ValkeyError::Connection(format!("No connection to {addr}"))
        })?;

        let result = client.request(args).await;
        if matches!(result, Err(ValkeyError::Io(_) | ValkeyError::Connection(_))) {
            // Drop the broken connection so the next call reconnects
            self.connections.remove(addr);
        }
        result
    }

    /// Issue a command at a key-routed or arbitrary node, following MOVED
    /// redirects (with a topology refresh) and ASK redirects up to the
    /// configured limit
    async fn request_routed_single(
        &mut self,
        mut addr: String,
        args: Vec<Bytes>,
    ) -> ValkeyResult<Value> {
        let max_redirects = self.config.max_redirects;
        let mut redirects = 0;

        loop {
            match self.request_at(&addr, args.clone()).await {
                Err(ValkeyError::Moved { slot, host, port }) if redirects < max_redirects => {
                    debug!("MOVED slot {slot} to {host}:{port}");
                    redirects += 1;
                    if self.refresh_topology().await.is_err() {
                        warn!("topology refresh after MOVED failed; following redirect anyway");
                    }
                    addr = format!("{host}:{port}");
                }
                Err(ValkeyError::Ask { host, port, .. }) if redirects < max_redirects => {
                    redirects += 1;
                    let target = format!("{host}:{port}");
                    self.request_at(&target, command_args("ASKING", Vec::<Bytes>::new()))
                        .await?;
                    return self.request_at(&target, args).await;
                }
                other => return other,
            }
        }
    }

    fn first_master_addr(&self) -> ValkeyResult<String> {
        self.topology
            .active_master_nodes()
            .first()
            .map(|node| node.address())
            .ok_or_else(|| {
                ValkeyError::ClusterState("No active master in topology".to_string())
            })
    }

    fn addr_for_key(&self, key: &[u8]) -> ValkeyResult<String> {
        let slot = calculate_slot(key);
        self.topology
            .nodes()
            .iter()
            .find(|node| node.is_master() && node.serves_slot(slot))
            .map(|node| node.address())
            .ok_or_else(|| {
                ValkeyError::ClusterState(format!("No master owns slot {slot}; stale topology?"))
            })
    }

    async fn fan_out(
        &mut self,
        addrs: Vec<String>,
        args: Vec<Bytes>,
    ) -> ValkeyResult<ClusterValue> {
        let mut entries = Vec::with_capacity(addrs.len());
        for addr in addrs {
            let reply = self.request_at(&addr, args.clone()).await?;
            entries.push((addr, reply));
        }
        Ok(ClusterValue::multi(entries))
    }

    fn master_addrs(&self) -> Vec<String> {
        self.topology
            .active_master_nodes()
            .iter()
            .map(|node| node.address())
            .collect()
    }

    fn all_addrs(&self) -> Vec<String> {
        self.topology
            .active_nodes()
            .iter()
            .map(|node| node.address())
            .collect()
    }
}

#[async_trait]
impl NativeClusterClient for ClusterTcpClient {
    async fn request(
        &mut self,
        args: Vec<Bytes>,
        route: Option<Route>,
    ) -> ValkeyResult<ClusterValue> {
        match route {
            Some(Route::Address(host, port)) => {
                let addr = format!("{host}:{port}");
                let reply = self.request_routed_single(addr, args).await?;
                Ok(ClusterValue::classify(reply))
            }
            Some(Route::AllPrimaries) => {
                let addrs = self.master_addrs();
                self.fan_out(addrs, args).await
            }
            Some(Route::AllNodes) => {
                let addrs = self.all_addrs();
                self.fan_out(addrs, args).await
            }
            None => {
                let label = command_label(&args);
                match default_route(&label) {
                    DefaultRoute::AllPrimaries => {
                        let addrs = self.master_addrs();
                        self.fan_out(addrs, args).await
                    }
                    DefaultRoute::AllNodes => {
                        let addrs = self.all_addrs();
                        self.fan_out(addrs, args).await
                    }
                    DefaultRoute::FirstKey => {
                        let addr = match args.get(1) {
                            Some(key) => self.addr_for_key(key)?,
                            None => self.first_master_addr()?,
                        };
                        let reply = self.request_routed_single(addr, args).await?;
                        Ok(ClusterValue::classify(reply))
                    }
                    DefaultRoute::Random => {
                        let addr = self.first_master_addr()?;
                        let reply = self.request_routed_single(addr, args).await?;
                        Ok(ClusterValue::classify(reply))
                    }
                }
            }
        }
    }
}
