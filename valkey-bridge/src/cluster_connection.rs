//! Cluster connection
//!
//! Extends the plain connection surface with node-targeted command
//! variants, cluster-wide fan-out with per-command aggregation, topology
//! access with a short-lived snapshot cache, and cluster administration.
//!
//! Aggregation strategies are part of the contract and command-specific:
//! counts are summed, key listings concatenated, and property maps merged
//! with a `"<node>.<property>"` key prefix.

use bytes::Bytes;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::time::Instant;
use tracing::{debug, warn};
use valkey_bridge_core::{
    config::ConnectionConfig,
    error::{ValkeyError, ValkeyResult},
    reply::Reply,
    types::ClusterNode,
};

use crate::adapter::UnifiedClient;
use crate::cluster_adapter::ClusterAdapter;
use crate::commands::{int_arg, static_arg, uint_arg};
use crate::connection::{copy_arg, Connection};
use crate::convert::{aggregate_config, aggregate_info, parse_info_properties, Conv};
use crate::driver::Route;
use crate::protocol::command_args;
use crate::scan::ScanOptions;
use crate::topology::{parse_cluster_slots, ClusterTopology};

/// Slot migration state set by CLUSTER SETSLOT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetSlotMode {
    /// Mark the slot as importing from another node
    Importing,
    /// Mark the slot as migrating to another node
    Migrating,
    /// Assign the slot to a node
    Node,
    /// Clear any importing/migrating state
    Stable,
}

impl SetSlotMode {
    const fn keyword(self) -> &'static str {
        match self {
            Self::Importing => "IMPORTING",
            Self::Migrating => "MIGRATING",
            Self::Node => "NODE",
            Self::Stable => "STABLE",
        }
    }
}

/// A connection to a cluster deployment
///
/// Derefs to [`Connection`] for the ordinary command groups; commands
/// issued that way are routed by the driver (keyed commands to the slot
/// owner, listed admin commands fanned out).
pub struct ClusterConnection {
    inner: Connection<ClusterAdapter>,
    cached_topology: Option<(ClusterTopology, Instant)>,
}

impl Deref for ClusterConnection {
    type Target = Connection<ClusterAdapter>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for ClusterConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl ClusterConnection {
    /// Create a new cluster connection over the given adapter
    pub fn new(adapter: ClusterAdapter, config: ConnectionConfig) -> Self {
        Self {
            inner: Connection::new(adapter, config),
            cached_topology: None,
        }
    }

    /// Execute a command with an explicit one-shot route
    ///
    /// # Errors
    ///
    /// Propagates the dispatch or conversion error.
    pub async fn execute_routed(
        &mut self,
        route: Route,
        command: &str,
        args: Vec<Bytes>,
        conv: Conv,
    ) -> ValkeyResult<Reply> {
        self.inner.client_mut().set_route_for_next_command(route);
        let reply = self.inner.execute(command, args, conv).await?;
        expect_direct(reply)
    }

    /// Current topology snapshot, served from cache within the configured
    /// time-to-live and refreshed from `CLUSTER SLOTS` otherwise
    ///
    /// # Errors
    ///
    /// Returns a cluster-state error when the reply cannot be parsed.
    pub async fn topology(&mut self) -> ValkeyResult<ClusterTopology> {
        let ttl = self.inner.config().topology_cache_ttl;
        if let Some((topology, refreshed_at)) = &self.cached_topology {
            if refreshed_at.elapsed() <= ttl {
                return Ok(topology.clone());
            }
        }

        debug!("refreshing cluster topology snapshot");
        let raw = self
            .inner
            .client_mut()
            .invoke(command_args("CLUSTER", [static_arg("SLOTS")]))
            .await?
            .ok_or_else(|| {
                ValkeyError::Protocol("CLUSTER SLOTS was queued unexpectedly".to_string())
            })?;

        let topology = parse_cluster_slots(raw)?;
        self.cached_topology = Some((topology.clone(), Instant::now()));
        Ok(topology)
    }

    /// Drop the cached topology snapshot, forcing a refresh on next access
    ///
    /// Called after commands that change slot assignment or membership.
    pub fn invalidate_topology_cache(&mut self) {
        self.cached_topology = None;
    }

    /// Resolve a node against the current topology, failing with a
    /// cluster-state error when the connection has no route to it
    async fn require_node(&mut self, node: &ClusterNode) -> ValkeyResult<ClusterNode> {
        let topology = self.topology().await?;
        Ok(topology.lookup(node)?.clone())
    }

    fn address_route(node: &ClusterNode) -> Route {
        Route::Address(node.host.clone(), node.port)
    }

    // ===== Node-targeted command variants =====

    /// Ping one node
    pub async fn ping_node(&mut self, node: &ClusterNode) -> ValkeyResult<String> {
        let node = self.require_node(node).await?;
        let reply = self
            .execute_routed(Self::address_route(&node), "PING", Vec::new(), Conv::Status)
            .await?;
        reply.try_into()
    }

    /// Keys matching a pattern on one node
    pub async fn keys_in_node(
        &mut self,
        node: &ClusterNode,
        pattern: &[u8],
    ) -> ValkeyResult<Vec<Bytes>> {
        let node = self.require_node(node).await?;
        let reply = self
            .execute_routed(
                Self::address_route(&node),
                "KEYS",
                vec![copy_arg(pattern)],
                Conv::BytesSeq,
            )
            .await?;
        reply.try_into()
    }

    /// A random key from one node
    pub async fn random_key_from_node(&mut self, node: &ClusterNode) -> ValkeyResult<Option<Bytes>> {
        let node = self.require_node(node).await?;
        let reply = self
            .execute_routed(
                Self::address_route(&node),
                "RANDOMKEY",
                Vec::new(),
                Conv::OptionalBytes,
            )
            .await?;
        reply.try_into()
    }

    /// Number of keys on one node
    pub async fn db_size_of_node(&mut self, node: &ClusterNode) -> ValkeyResult<i64> {
        let node = self.require_node(node).await?;
        let reply = self
            .execute_routed(Self::address_route(&node), "DBSIZE", Vec::new(), Conv::Int)
            .await?;
        reply.try_into()
    }

    /// Server information of one node
    pub async fn info_of_node(&mut self, node: &ClusterNode) -> ValkeyResult<Vec<(String, String)>> {
        let node = self.require_node(node).await?;
        let reply = self
            .execute_routed(Self::address_route(&node), "INFO", Vec::new(), Conv::Raw)
            .await?;
        Ok(parse_info_properties(&String::try_from(reply)?))
    }

    /// Remove every key on one node
    pub async fn flush_db_of_node(&mut self, node: &ClusterNode) -> ValkeyResult<()> {
        let node = self.require_node(node).await?;
        self.execute_routed(Self::address_route(&node), "FLUSHDB", Vec::new(), Conv::OkBool)
            .await?;
        Ok(())
    }

    /// Iterate the keyspace of one node, collecting every element
    ///
    /// Each batch is routed to the node explicitly; the cursor token is
    /// only meaningful on the node that issued it.
    pub async fn scan_node(
        &mut self,
        node: &ClusterNode,
        options: ScanOptions,
    ) -> ValkeyResult<Vec<Bytes>> {
        let node = self.require_node(node).await?;
        let mut collected = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let mut args = vec![uint_arg(cursor)];
            options.append_args(&mut args);

            let reply = self
                .execute_routed(Self::address_route(&node), "SCAN", args, Conv::Raw)
                .await?;
            let Reply::Seq(mut parts) = reply else {
                return Err(ValkeyError::Type("Unexpected SCAN reply shape".to_string()));
            };
            if parts.len() != 2 {
                return Err(ValkeyError::Type("Unexpected SCAN reply arity".to_string()));
            }
            let items = parts.pop().unwrap_or(Reply::Nil);
            let token: Bytes = parts.pop().unwrap_or(Reply::Nil).try_into()?;
            cursor = String::from_utf8_lossy(&token)
                .parse::<u64>()
                .map_err(|e| ValkeyError::Type(format!("Invalid cursor token: {e}")))?;

            let items: Vec<Bytes> = items.try_into()?;
            collected.extend(items);

            if cursor == 0 {
                return Ok(collected);
            }
        }
    }

    // ===== Cluster-wide forms with per-command aggregation =====

    /// Total number of keys across all master nodes (summed)
    pub async fn db_size(&mut self) -> ValkeyResult<i64> {
        let reply = expect_direct(self.inner.execute("DBSIZE", Vec::new(), Conv::Raw).await?)?;
        match reply {
            Reply::Map(entries) => {
                let mut total = 0;
                for (_, value) in entries {
                    total += i64::try_from(value)?;
                }
                Ok(total)
            }
            // A driver that aggregates itself reports the total directly
            other => other.try_into(),
        }
    }

    /// Server information of every master node, merged with each property
    /// key prefixed by the reporting node's address
    pub async fn info(&mut self) -> ValkeyResult<Vec<(String, String)>> {
        let reply = expect_direct(self.inner.execute("INFO", Vec::new(), Conv::Raw).await?)?;
        node_map_entries(reply).and_then(aggregate_info)
    }

    /// One section of every master node's information, merged with node
    /// prefixes
    pub async fn info_section(&mut self, section: &str) -> ValkeyResult<Vec<(String, String)>> {
        let reply = expect_direct(
            self.inner
                .execute("INFO", vec![copy_arg(section.as_bytes())], Conv::Raw)
                .await?,
        )?;
        node_map_entries(reply).and_then(aggregate_info)
    }

    /// All keys matching a pattern, concatenated across master nodes
    pub async fn keys(&mut self, pattern: &[u8]) -> ValkeyResult<Vec<Bytes>> {
        let reply = expect_direct(
            self.inner
                .execute("KEYS", vec![copy_arg(pattern)], Conv::Raw)
                .await?,
        )?;
        match reply {
            Reply::Map(entries) => {
                let mut keys = Vec::new();
                for (_, value) in entries {
                    let node_keys: Vec<Bytes> = value.try_into()?;
                    keys.extend(node_keys);
                }
                Ok(keys)
            }
            other => other.try_into(),
        }
    }

    /// Remove every key of every database on every master node
    pub async fn flush_all(&mut self) -> ValkeyResult<()> {
        let reply = expect_direct(self.inner.execute("FLUSHALL", Vec::new(), Conv::Raw).await?)?;
        all_nodes_ok("FLUSHALL", reply)
    }

    /// Remove every key of the current database on every master node
    pub async fn flush_db(&mut self) -> ValkeyResult<()> {
        let reply = expect_direct(self.inner.execute("FLUSHDB", Vec::new(), Conv::Raw).await?)?;
        all_nodes_ok("FLUSHDB", reply)
    }

    /// Most recent successful save timestamp across all master nodes
    pub async fn last_save(&mut self) -> ValkeyResult<Option<i64>> {
        let reply = self
            .execute_routed(Route::AllPrimaries, "LASTSAVE", Vec::new(), Conv::Raw)
            .await?;
        match reply {
            Reply::Map(entries) => {
                let mut latest = None;
                for (_, value) in entries {
                    let stamp = i64::try_from(value)?;
                    latest = Some(latest.map_or(stamp, |current: i64| current.max(stamp)));
                }
                Ok(latest)
            }
            other => Ok(Some(other.try_into()?)),
        }
    }

    /// Trigger a background save on every master node
    pub async fn bg_save(&mut self) -> ValkeyResult<()> {
        self.execute_routed(Route::AllPrimaries, "BGSAVE", Vec::new(), Conv::Raw)
            .await?;
        Ok(())
    }

    /// Trigger an append-only-file rewrite on every master node
    pub async fn bg_rewrite_aof(&mut self) -> ValkeyResult<()> {
        self.execute_routed(Route::AllPrimaries, "BGREWRITEAOF", Vec::new(), Conv::Raw)
            .await?;
        Ok(())
    }

    /// Configuration parameters matching a pattern from every master node,
    /// merged with node prefixes
    pub async fn config_get(&mut self, pattern: &str) -> ValkeyResult<Vec<(String, String)>> {
        let reply = self
            .execute_routed(
                Route::AllPrimaries,
                "CONFIG",
                vec![static_arg("GET"), copy_arg(pattern.as_bytes())],
                Conv::Raw,
            )
            .await?;
        node_map_entries(reply).and_then(aggregate_config)
    }

    /// Set a configuration parameter on every node
    pub async fn config_set(&mut self, parameter: &str, value: &str) -> ValkeyResult<()> {
        let reply = expect_direct(
            self.inner
                .execute(
                    "CONFIG",
                    vec![
                        static_arg("SET"),
                        copy_arg(parameter.as_bytes()),
                        copy_arg(value.as_bytes()),
                    ],
                    Conv::Raw,
                )
                .await?,
        )?;
        all_nodes_ok("CONFIG SET", reply)
    }

    /// Select is meaningless on a cluster; only index 0 is accepted
    ///
    /// # Errors
    ///
    /// Returns a usage error for any non-zero index.
    pub fn select(&mut self, db_index: u8) -> ValkeyResult<()> {
        if db_index != 0 {
            return Err(ValkeyError::Usage(
                "Cannot SELECT a non-zero index in cluster mode".to_string(),
            ));
        }
        Ok(())
    }

    /// WATCH is rejected: transactions are not supported in cluster mode,
    /// so an optimistic lock could never be consumed
    ///
    /// # Errors
    ///
    /// Always returns a usage error.
    pub fn watch(&mut self, _keys: Vec<Bytes>) -> ValkeyResult<()> {
        Err(ValkeyError::Usage(
            "WATCH is not supported in cluster mode".to_string(),
        ))
    }

    /// UNWATCH is rejected alongside [`watch`](Self::watch)
    ///
    /// # Errors
    ///
    /// Always returns a usage error.
    pub fn unwatch(&mut self) -> ValkeyResult<()> {
        Err(ValkeyError::Usage(
            "UNWATCH is not supported in cluster mode".to_string(),
        ))
    }

    // ===== Cluster state and administration =====

    /// Aggregated cluster state as key/value properties (`CLUSTER INFO`)
    pub async fn cluster_info(&mut self) -> ValkeyResult<Vec<(String, String)>> {
        let reply = expect_direct(
            self.inner
                .execute("CLUSTER", vec![static_arg("INFO")], Conv::Raw)
                .await?,
        )?;
        Ok(parse_info_properties(&String::try_from(reply)?))
    }

    /// Slot of a key as computed by the server
    pub async fn cluster_key_slot(&mut self, key: &[u8]) -> ValkeyResult<u16> {
        let reply = expect_direct(
            self.inner
                .execute("CLUSTER", vec![static_arg("KEYSLOT"), copy_arg(key)], Conv::Int)
                .await?,
        )?;
        Ok(i64::try_from(reply)? as u16)
    }

    /// Number of keys in a slot, asked of the owning master
    pub async fn cluster_count_keys_in_slot(&mut self, slot: u16) -> ValkeyResult<i64> {
        let owner = self.slot_owner(slot).await?;
        let reply = self
            .execute_routed(
                Self::address_route(&owner),
                "CLUSTER",
                vec![static_arg("COUNTKEYSINSLOT"), uint_arg(u64::from(slot))],
                Conv::Int,
            )
            .await?;
        reply.try_into()
    }

    /// Keys in a slot, asked of the owning master
    pub async fn cluster_get_keys_in_slot(
        &mut self,
        slot: u16,
        count: u64,
    ) -> ValkeyResult<Vec<Bytes>> {
        let owner = self.slot_owner(slot).await?;
        let reply = self
            .execute_routed(
                Self::address_route(&owner),
                "CLUSTER",
                vec![
                    static_arg("GETKEYSINSLOT"),
                    uint_arg(u64::from(slot)),
                    uint_arg(count),
                ],
                Conv::BytesSeq,
            )
            .await?;
        reply.try_into()
    }

    /// Introduce a new node to every master
    pub async fn cluster_meet(&mut self, host: &str, port: u16) -> ValkeyResult<()> {
        if host.is_empty() || port == 0 {
            return Err(ValkeyError::Usage(
                "Node to meet must have a host and a non-zero port".to_string(),
            ));
        }
        self.execute_routed(
            Route::AllPrimaries,
            "CLUSTER",
            vec![
                static_arg("MEET"),
                copy_arg(host.as_bytes()),
                uint_arg(u64::from(port)),
            ],
            Conv::Raw,
        )
        .await?;
        self.invalidate_topology_cache();
        Ok(())
    }

    /// Remove a node from the cluster, telling every other active master
    /// to forget it
    pub async fn cluster_forget(&mut self, node: &ClusterNode) -> ValkeyResult<()> {
        let doomed = self.require_node(node).await?;
        let masters: Vec<ClusterNode> = self
            .topology()
            .await?
            .active_master_nodes()
            .into_iter()
            .cloned()
            .collect();

        for master in masters {
            if master.id == doomed.id {
                continue;
            }
            self.execute_routed(
                Self::address_route(&master),
                "CLUSTER",
                vec![static_arg("FORGET"), copy_arg(doomed.id.as_bytes())],
                Conv::Raw,
            )
            .await?;
        }

        self.invalidate_topology_cache();
        Ok(())
    }

    /// Reconfigure a node as a replica of the given master
    pub async fn cluster_replicate(
        &mut self,
        master: &ClusterNode,
        replica: &ClusterNode,
    ) -> ValkeyResult<()> {
        let master = self.require_node(master).await?;
        let replica = self.require_node(replica).await?;
        self.execute_routed(
            Self::address_route(&replica),
            "CLUSTER",
            vec![static_arg("REPLICATE"), copy_arg(master.id.as_bytes())],
            Conv::Raw,
        )
        .await?;
        self.invalidate_topology_cache();
        Ok(())
    }

    /// Change a slot's migration state on a node
    pub async fn cluster_set_slot(
        &mut self,
        node: &ClusterNode,
        slot: u16,
        mode: SetSlotMode,
    ) -> ValkeyResult<()> {
        let target = self.require_node(node).await?;

        let mut args = vec![
            static_arg("SETSLOT"),
            uint_arg(u64::from(slot)),
            static_arg(mode.keyword()),
        ];
        if mode != SetSlotMode::Stable {
            args.push(copy_arg(target.id.as_bytes()));
        }

        self.execute_routed(Self::address_route(&target), "CLUSTER", args, Conv::Raw)
            .await?;
        self.invalidate_topology_cache();
        Ok(())
    }

    /// Assign slots to a node
    pub async fn cluster_add_slots(&mut self, node: &ClusterNode, slots: &[u16]) -> ValkeyResult<()> {
        self.slot_admin("ADDSLOTS", node, slots).await
    }

    /// Remove slot assignments from a node
    pub async fn cluster_delete_slots(
        &mut self,
        node: &ClusterNode,
        slots: &[u16],
    ) -> ValkeyResult<()> {
        self.slot_admin("DELSLOTS", node, slots).await
    }

    async fn slot_admin(
        &mut self,
        subcommand: &'static str,
        node: &ClusterNode,
        slots: &[u16],
    ) -> ValkeyResult<()> {
        let target = self.require_node(node).await?;
        let mut args = vec![static_arg(subcommand)];
        args.extend(slots.iter().map(|slot| int_arg(i64::from(*slot))));

        self.execute_routed(Self::address_route(&target), "CLUSTER", args, Conv::Raw)
            .await?;
        self.invalidate_topology_cache();
        Ok(())
    }

    /// Master node currently serving a key
    pub async fn cluster_node_for_key(&mut self, key: &[u8]) -> ValkeyResult<ClusterNode> {
        let topology = self.topology().await?;
        Ok(topology.key_serving_master_node(key)?.clone())
    }

    /// Master node currently owning a slot
    pub async fn slot_owner(&mut self, slot: u16) -> ValkeyResult<ClusterNode> {
        let topology = self.topology().await?;
        topology
            .slot_serving_nodes(slot)
            .into_iter()
            .find(|node| node.is_master())
            .cloned()
            .ok_or_else(|| {
                ValkeyError::ClusterState(format!("No master owns slot {slot}; stale topology?"))
            })
    }

    /// Group keys by the master node serving them
    ///
    /// # Errors
    ///
    /// Returns a cluster-state error when any key cannot be resolved to a
    /// master, which indicates a stale or incomplete topology.
    pub async fn node_key_map(
        &mut self,
        keys: &[&[u8]],
    ) -> ValkeyResult<Vec<(ClusterNode, Vec<Bytes>)>> {
        let topology = self.topology().await?;
        let mut grouped: HashMap<String, (ClusterNode, Vec<Bytes>)> = HashMap::new();

        for key in keys {
            let master = topology.key_serving_master_node(key)?;
            grouped
                .entry(master.id.clone())
                .or_insert_with(|| (master.clone(), Vec::new()))
                .1
                .push(Bytes::from(key.to_vec()));
        }

        Ok(grouped.into_values().collect())
    }
}

fn expect_direct(reply: Option<Reply>) -> ValkeyResult<Reply> {
    reply.ok_or_else(|| {
        ValkeyError::Protocol("Cluster command was queued unexpectedly".to_string())
    })
}

/// Entries of a per-node reply map
fn node_map_entries(reply: Reply) -> ValkeyResult<Vec<(Bytes, Reply)>> {
    match reply {
        Reply::Map(entries) => Ok(entries),
        other => Err(ValkeyError::Type(format!(
            "Expected a per-node reply map, got {other:?}"
        ))),
    }
}

fn all_nodes_ok(command: &str, reply: Reply) -> ValkeyResult<()> {
    match reply {
        Reply::Map(entries) => {
            for (node, value) in entries {
                let ok = matches!(&value, Reply::Status(s) if s == "OK");
                if !ok {
                    warn!(
                        node = %String::from_utf8_lossy(&node),
                        "{command} did not succeed on every node"
                    );
                    return Err(ValkeyError::Server(format!(
                        "{command} failed on node {}: {value:?}",
                        String::from_utf8_lossy(&node)
                    )));
                }
            }
            Ok(())
        }
        Reply::Status(s) if s == "OK" => Ok(()),
        other => Err(ValkeyError::Type(format!(
            "Unexpected {command} reply: {other:?}"
        ))),
    }
}
