//! Cluster node snapshot types

use serde::{Deserialize, Serialize};

/// Role of a node within the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    /// Master node owning hash slots
    Master,
    /// Replica of a master
    Replica,
}

/// Link state of a node as reported by the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    /// Cluster bus link is established
    Connected,
    /// Cluster bus link is down
    Disconnected,
}

/// An inclusive range of hash slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRange {
    /// Start of the slot range (inclusive)
    pub start: u16,
    /// End of the slot range (inclusive)
    pub end: u16,
}

impl SlotRange {
    /// Create a new slot range
    #[must_use]
    pub const fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    /// Check if a slot is within this range
    #[must_use]
    pub const fn contains(&self, slot: u16) -> bool {
        slot >= self.start && slot <= self.end
    }
}

/// Immutable snapshot of one cluster node
///
/// Created when the topology is refreshed from the server and replaced
/// wholesale on the next refresh; never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterNode {
    /// Node ID as reported by the cluster
    pub id: String,
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Role of the node
    pub node_type: NodeType,
    /// Cluster bus link state
    pub link_state: LinkState,
    /// Whether the cluster has flagged this node as failing
    pub marked_fail: bool,
    /// Master node ID when this node is a replica
    pub master_id: Option<String>,
    /// Slot ranges owned by this node (masters only)
    pub slots: Vec<SlotRange>,
}

impl ClusterNode {
    /// Create a new master node snapshot
    #[must_use]
    pub fn master(id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
            node_type: NodeType::Master,
            link_state: LinkState::Connected,
            marked_fail: false,
            master_id: None,
            slots: Vec::new(),
        }
    }

    /// Create a new replica node snapshot
    #[must_use]
    pub fn replica(
        id: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        master_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
            node_type: NodeType::Replica,
            link_state: LinkState::Connected,
            marked_fail: false,
            master_id: Some(master_id.into()),
            slots: Vec::new(),
        }
    }

    /// Assign slot ranges to this node
    #[must_use]
    pub fn serving(mut self, ranges: Vec<SlotRange>) -> Self {
        self.slots = ranges;
        self
    }

    /// Set the link state
    #[must_use]
    pub const fn with_link_state(mut self, state: LinkState) -> Self {
        self.link_state = state;
        self
    }

    /// Flag the node as failing
    #[must_use]
    pub const fn with_marked_fail(mut self, marked_fail: bool) -> Self {
        self.marked_fail = marked_fail;
        self
    }

    /// Check if this node is a master
    #[must_use]
    pub const fn is_master(&self) -> bool {
        matches!(self.node_type, NodeType::Master)
    }

    /// Check if the cluster bus link is established
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self.link_state, LinkState::Connected)
    }

    /// Check if the cluster has flagged this node as failing
    #[must_use]
    pub const fn is_marked_fail(&self) -> bool {
        self.marked_fail
    }

    /// Check if this node owns a given slot
    #[must_use]
    pub fn serves_slot(&self, slot: u16) -> bool {
        self.slots.iter().any(|range| range.contains(slot))
    }

    /// Get the node address as "host:port"
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
