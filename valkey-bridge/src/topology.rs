//! Cluster topology snapshot and slot hashing
//!
//! A [`ClusterTopology`] is an immutable snapshot of node membership and
//! slot ownership, constructed fresh from a server-reported node list and
//! replaced wholesale on refresh. Lookups that miss fail with a
//! cluster-state error: the snapshot may simply be stale, and callers are
//! expected to refresh and retry rather than treat the node as gone.

use crc16::{State, XMODEM};
use valkey_bridge_core::{
    error::{ValkeyError, ValkeyResult},
    types::{ClusterNode, SlotRange},
    value::Value,
};

/// Total number of hash slots in a cluster
pub const CLUSTER_SLOTS: u16 = 16384;

/// Calculate the hash slot for a given key
///
/// Implements the cluster key hashing algorithm the server itself uses,
/// which client-side routing must match exactly:
/// - if the key contains `{...}`, only the part between the first `{` and
///   the first following `}` is hashed (and only if non-empty)
/// - otherwise the entire key is hashed
/// - the slot is CRC16 (XMODEM) of the hashed part mod 16384
#[must_use]
pub fn calculate_slot(key: &[u8]) -> u16 {
    let hash_key = extract_hash_tag(key);
    State::<XMODEM>::calculate(hash_key) % CLUSTER_SLOTS
}

/// Extract the hash tag from a key
///
/// Hash tags force co-location: `{user1000}.following` and
/// `{user1000}.followers` hash to the same slot.
fn extract_hash_tag(key: &[u8]) -> &[u8] {
    if let Some(start) = key.iter().position(|&b| b == b'{') {
        if let Some(end) = key[start + 1..].iter().position(|&b| b == b'}') {
            let end = start + 1 + end;
            // An empty tag does not count
            if end > start + 1 {
                return &key[start + 1..end];
            }
        }
    }
    key
}

/// Immutable snapshot of cluster node membership and slot ownership
#[derive(Debug, Clone, Default)]
pub struct ClusterTopology {
    nodes: Vec<ClusterNode>,
}

impl ClusterTopology {
    /// Create a new snapshot over the given nodes
    #[must_use]
    pub fn new(nodes: Vec<ClusterNode>) -> Self {
        Self { nodes }
    }

    /// All nodes in the snapshot
    #[must_use]
    pub fn nodes(&self) -> &[ClusterNode] {
        &self.nodes
    }

    /// All nodes whose link is established and that are not flagged as
    /// failing; the safe targets for fan-out commands
    #[must_use]
    pub fn active_nodes(&self) -> Vec<&ClusterNode> {
        self.nodes
            .iter()
            .filter(|node| node.is_connected() && !node.is_marked_fail())
            .collect()
    }

    /// All master nodes whose link is established and that are not flagged
    /// as failing
    #[must_use]
    pub fn active_master_nodes(&self) -> Vec<&ClusterNode> {
        self.nodes
            .iter()
            .filter(|node| node.is_master() && node.is_connected() && !node.is_marked_fail())
            .collect()
    }

    /// All master nodes
    #[must_use]
    pub fn master_nodes(&self) -> Vec<&ClusterNode> {
        self.nodes.iter().filter(|node| node.is_master()).collect()
    }

    /// All nodes (master and replicas) serving the given slot
    #[must_use]
    pub fn slot_serving_nodes(&self, slot: u16) -> Vec<&ClusterNode> {
        self.nodes
            .iter()
            .filter(|node| {
                node.serves_slot(slot)
                    || node
                        .master_id
                        .as_ref()
                        .is_some_and(|id| self.master_serves_slot(id, slot))
            })
            .collect()
    }

    fn master_serves_slot(&self, master_id: &str, slot: u16) -> bool {
        self.nodes
            .iter()
            .any(|node| node.id == master_id && node.serves_slot(slot))
    }

    /// The master node currently serving the given key
    ///
    /// # Errors
    ///
    /// Returns a cluster-state error when no owning master is found,
    /// signaling a stale snapshot.
    pub fn key_serving_master_node(&self, key: &[u8]) -> ValkeyResult<&ClusterNode> {
        let slot = calculate_slot(key);

        self.nodes
            .iter()
            .find(|node| node.is_master() && node.serves_slot(slot))
            .ok_or_else(|| {
                ValkeyError::ClusterState(format!(
                    "Could not find master node serving slot {slot} for key {key:?}"
                ))
            })
    }

    /// All nodes serving the given key's slot
    #[must_use]
    pub fn key_serving_nodes(&self, key: &[u8]) -> Vec<&ClusterNode> {
        self.slot_serving_nodes(calculate_slot(key))
    }

    /// Look up a node by host and port
    ///
    /// # Errors
    ///
    /// Returns a cluster-state error when absent; the snapshot may be stale.
    pub fn lookup_addr(&self, host: &str, port: u16) -> ValkeyResult<&ClusterNode> {
        self.nodes
            .iter()
            .find(|node| node.host == host && node.port == port)
            .ok_or_else(|| {
                ValkeyError::ClusterState(format!(
                    "Could not find node at {host}:{port}; is your cluster info up to date?"
                ))
            })
    }

    /// Look up a node by its cluster node ID
    ///
    /// # Errors
    ///
    /// Returns a cluster-state error when absent; the snapshot may be stale.
    pub fn lookup_id(&self, node_id: &str) -> ValkeyResult<&ClusterNode> {
        self.nodes
            .iter()
            .find(|node| node.id == node_id)
            .ok_or_else(|| {
                ValkeyError::ClusterState(format!(
                    "Could not find node {node_id}; is your cluster info up to date?"
                ))
            })
    }

    /// Look up a node by whatever identity the given snapshot carries:
    /// host and port when valid, node ID otherwise
    ///
    /// # Errors
    ///
    /// Returns a cluster-state error when the node cannot be resolved.
    pub fn lookup(&self, node: &ClusterNode) -> ValkeyResult<&ClusterNode> {
        if !node.host.is_empty() && node.port != 0 {
            return self.lookup_addr(&node.host, node.port);
        }
        if !node.id.is_empty() {
            return self.lookup_id(&node.id);
        }
        Err(ValkeyError::ClusterState(format!(
            "Could not find node {node:?}; provide either host and port or the node ID"
        )))
    }

    /// Replicas of the given master
    #[must_use]
    pub fn replicas_of(&self, master_id: &str) -> Vec<&ClusterNode> {
        self.nodes
            .iter()
            .filter(|node| !node.is_master() && node.master_id.as_deref() == Some(master_id))
            .collect()
    }
}

/// Parse a `CLUSTER SLOTS` reply into a topology snapshot
///
/// The reply is an array of slot ranges, each shaped
/// `[start, end, [master_host, master_port, master_id], [replica...], ...]`.
///
/// # Errors
///
/// Returns a cluster-state error when the reply is not shaped as expected.
pub fn parse_cluster_slots(reply: Value) -> ValkeyResult<ClusterTopology> {
    let ranges = reply.into_array().map_err(|_| {
        ValkeyError::ClusterState("Expected array reply from CLUSTER SLOTS".to_string())
    })?;

    let mut nodes: Vec<ClusterNode> = Vec::new();

    for range in ranges {
        let Ok(parts) = range.into_array() else {
            continue;
        };

        let mut parts = parts.into_iter();
        let (Some(start), Some(end), Some(master_info)) =
            (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        let start = start.as_int()? as u16;
        let end = end.as_int()? as u16;

        let (host, port, id) = parse_node_entry(master_info)?;
        let master_id = id.unwrap_or_else(|| format!("{host}:{port}"));

        merge_master(
            &mut nodes,
            master_id.clone(),
            host,
            port,
            SlotRange::new(start, end),
        );

        for replica_info in parts {
            if let Ok((host, port, id)) = parse_node_entry(replica_info) {
                let replica_id = id.unwrap_or_else(|| format!("{host}:{port}"));
                if !nodes.iter().any(|n| n.id == replica_id) {
                    nodes.push(ClusterNode::replica(replica_id, host, port, master_id.clone()));
                }
            }
        }
    }

    if nodes.is_empty() {
        return Err(ValkeyError::ClusterState(
            "CLUSTER SLOTS reported no nodes".to_string(),
        ));
    }

    Ok(ClusterTopology::new(nodes))
}

fn merge_master(nodes: &mut Vec<ClusterNode>, id: String, host: String, port: u16, range: SlotRange) {
    if let Some(existing) = nodes.iter_mut().find(|n| n.id == id) {
        existing.slots.push(range);
        return;
    }
    nodes.push(ClusterNode::master(id, host, port).serving(vec![range]));
}

fn parse_node_entry(entry: Value) -> ValkeyResult<(String, u16, Option<String>)> {
    let parts = entry.into_array().map_err(|_| {
        ValkeyError::ClusterState("Malformed node entry in CLUSTER SLOTS reply".to_string())
    })?;
    if parts.len() < 2 {
        return Err(ValkeyError::ClusterState(
            "Node entry in CLUSTER SLOTS reply is too short".to_string(),
        ));
    }

    let host = parts[0].as_string().map_err(|_| {
        ValkeyError::ClusterState("Node host missing in CLUSTER SLOTS reply".to_string())
    })?;
    let port = parts[1].as_int()? as u16;
    if host.is_empty() || port == 0 {
        return Err(ValkeyError::ClusterState(format!(
            "Invalid node address {host}:{port} in CLUSTER SLOTS reply"
        )));
    }

    let id = parts
        .get(2)
        .and_then(|v| v.as_string().ok())
        .filter(|s| !s.is_empty());

    Ok((host, port, id))
}
