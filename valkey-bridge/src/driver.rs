//! Native client contract
//!
//! The binding layer sits on top of native wire clients with heterogeneous
//! shapes: a single-node client with batch support and a cluster client with
//! its own routing engine. These traits pin down the exact calling
//! convention the adapters rely on, so any driver (the in-repo TCP clients,
//! a pooled client, or a test double) can be plugged in.

use async_trait::async_trait;
use bytes::Bytes;
use valkey_bridge_core::{
    error::{ValkeyError, ValkeyResult},
    value::Value,
};

/// Outcome of one position in an executed batch
pub type BatchEntry = ValkeyResult<Value>;

/// A single-node native client
///
/// `request_batch` sends all commands in one round trip. With
/// `atomic = true` the batch runs as a MULTI/EXEC transaction and resolves
/// to `None` when the server aborted it because a watched key changed.
#[async_trait]
pub trait NativeClient: Send {
    /// Issue one command (name plus arguments) and await its reply
    async fn request(&mut self, args: Vec<Bytes>) -> ValkeyResult<Value>;

    /// Execute a batch of commands in a single round trip
    ///
    /// Per-command server errors are captured positionally, not raised.
    async fn request_batch(
        &mut self,
        commands: Vec<Vec<Bytes>>,
        atomic: bool,
    ) -> ValkeyResult<Option<Vec<BatchEntry>>>;
}

/// Explicit routing directive for one cluster command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Route to the node listening at the given address
    Address(String, u16),
    /// Fan out to every master node
    AllPrimaries,
    /// Fan out to every node, masters and replicas
    AllNodes,
}

impl Route {
    /// Check whether this route fans out to multiple nodes
    #[must_use]
    pub const fn is_multi_node(&self) -> bool {
        matches!(self, Self::AllPrimaries | Self::AllNodes)
    }
}

/// Reply of a cluster client call
///
/// The native cluster client classifies every reply by *shape*: a map-shaped
/// reply is filed as `Multi` with its keys coerced to strings, whether or
/// not the command actually fanned out. For commands whose single-node reply
/// is itself a key/value map (full-hash retrieval, range-with-scores, stream
/// reads) that classification is wrong, and [`crate::cluster_adapter`]
/// repairs it using the command tables in [`crate::routing`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterValue {
    /// A reply from exactly one node
    Single(Value),
    /// A reply per node keyed by string, or a misfiled map-shaped reply
    Multi(Vec<(String, Value)>),
}

impl ClusterValue {
    /// File a single-node reply the way the native cluster client does:
    /// by structure, coercing map keys to strings
    #[must_use]
    pub fn classify(reply: Value) -> Self {
        match reply {
            Value::Map(entries) => Self::Multi(
                entries
                    .into_iter()
                    .map(|(key, value)| (lossy_key(key), value))
                    .collect(),
            ),
            other => Self::Single(other),
        }
    }

    /// Build a true multi-node reply keyed by node address
    #[must_use]
    pub fn multi(entries: Vec<(String, Value)>) -> Self {
        Self::Multi(entries)
    }

    /// Check whether this value carries per-key multi data
    #[must_use]
    pub const fn has_multi_data(&self) -> bool {
        matches!(self, Self::Multi(_))
    }
}

fn lossy_key(key: Value) -> String {
    match key {
        Value::Bytes(b) => String::from_utf8_lossy(&b).into_owned(),
        Value::Simple(s) => s,
        Value::Int(i) => i.to_string(),
        other => format!("{other:?}"),
    }
}

/// A cluster-aware native client with its own routing engine
///
/// With `route = None` the client applies its default routing: keyed
/// commands go to the slot-owning master, the admin commands listed in
/// [`crate::routing::default_route`] silently fan out, everything else goes
/// to an arbitrary node.
#[async_trait]
pub trait NativeClusterClient: Send {
    /// Issue one command, optionally with an explicit routing directive
    async fn request(&mut self, args: Vec<Bytes>, route: Option<Route>)
        -> ValkeyResult<ClusterValue>;
}

/// Reject a batch operation on a client that cannot batch
pub(crate) fn batch_unsupported<T>() -> ValkeyResult<T> {
    Err(ValkeyError::Usage(
        "Transactions and pipelines are not supported in cluster mode".to_string(),
    ))
}
