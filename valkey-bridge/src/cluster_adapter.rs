//! Cluster client adapter
//!
//! Wraps the cluster-aware native client behind [`UnifiedClient`] and
//! repairs the client's result-shape classification. The native client
//! files any map-shaped reply as multi-node data with string keys, which is
//! only correct when the command actually fanned out; for single-node
//! commands whose reply is itself a key/value map the real result would be
//! silently replaced by that misfiled container. The repair is driven by
//! the command tables in [`crate::routing`]:
//!
//! 1. an explicit multi-node route was set: the per-node map is the result;
//! 2. no route, but the command fans out by default: the per-node map is
//!    the result;
//! 3. stream-family commands returning nested record maps: passed through
//!    exactly as the client shaped them;
//! 4. any other map-shaped reply: a single-node reply that was misfiled;
//!    its keys are restored to the binary key type without copying values.

use async_trait::async_trait;
use bytes::Bytes;
use valkey_bridge_core::error::{ValkeyError, ValkeyResult};
use valkey_bridge_core::value::Value;

use crate::adapter::{BatchStatus, UnifiedClient};
use crate::driver::{batch_unsupported, BatchEntry, ClusterValue, NativeClusterClient, Route};
use crate::routing::{command_label, is_default_multi_node_command, is_nested_map_command};

/// Adapter over a cluster-aware native client
///
/// Holds one-shot routing state: a route set via
/// [`set_route_for_next_command`](Self::set_route_for_next_command) applies
/// to exactly the next `invoke` and is consumed before the command is
/// dispatched, so it cannot leak into a later call even when the command
/// fails. Not safe for concurrent use; one adapter serves one borrowed
/// connection at a time.
pub struct ClusterAdapter {
    client: Box<dyn NativeClusterClient>,
    next_route: Option<Route>,
}

impl ClusterAdapter {
    /// Create a new adapter over the given cluster client
    pub fn new(client: Box<dyn NativeClusterClient>) -> Self {
        Self {
            client,
            next_route: None,
        }
    }

    /// Set an explicit route for the next command only
    pub fn set_route_for_next_command(&mut self, route: Route) {
        self.next_route = Some(route);
    }

    /// Route currently staged for the next command, if any
    #[must_use]
    pub fn staged_route(&self) -> Option<&Route> {
        self.next_route.as_ref()
    }
}

/// Restore binary keys on a map-shaped reply the native client misfiled
///
/// The client coerced the map's keys to strings while classifying the reply
/// as multi-node data. This rebuilds the map with `Bytes` keys; values are
/// moved, never copied, and each key conversion reuses the string's buffer.
fn restore_key_map(entries: Vec<(String, Value)>) -> Value {
    Value::Map(
        entries
            .into_iter()
            .map(|(key, value)| (Value::Bytes(Bytes::from(key.into_bytes())), value))
            .collect(),
    )
}

/// Present a true per-node reply map as a value keyed by node address
fn node_map(entries: Vec<(String, Value)>) -> Value {
    Value::Map(
        entries
            .into_iter()
            .map(|(addr, value)| (Value::Simple(addr), value))
            .collect(),
    )
}

/// Present a nested record map exactly as the native client shaped it,
/// string keys preserved
fn nested_map(entries: Vec<(String, Value)>) -> Value {
    Value::Map(
        entries
            .into_iter()
            .map(|(key, value)| (Value::Simple(key), value))
            .collect(),
    )
}

#[async_trait]
impl UnifiedClient for ClusterAdapter {
    fn batch_status(&self) -> BatchStatus {
        BatchStatus::None
    }

    fn batch_len(&self) -> ValkeyResult<usize> {
        Err(ValkeyError::Usage("No batch in progress".to_string()))
    }

    fn start_batch(&mut self, _atomic: bool) -> ValkeyResult<()> {
        batch_unsupported()
    }

    async fn exec_batch(&mut self) -> ValkeyResult<Option<Vec<BatchEntry>>> {
        batch_unsupported()
    }

    fn discard_batch(&mut self) {}

    async fn invoke(&mut self, args: Vec<Bytes>) -> ValkeyResult<Option<Value>> {
        // One-shot: taking the route clears it before any fallible work
        let route = self.next_route.take();
        let label = command_label(&args);
        let explicit_multi = route.as_ref().is_some_and(Route::is_multi_node);
        let defaulted = route.is_none();

        let reply = self.client.request(args, route).await?;

        // Case 1: explicit multi-node route; the per-node map is the result
        if explicit_multi {
            return match reply {
                ClusterValue::Multi(entries) => Ok(Some(node_map(entries))),
                ClusterValue::Single(value) => Ok(Some(value)),
            };
        }

        match reply {
            // Case 2: the command fans out by default; per-node data is real
            ClusterValue::Multi(entries)
                if defaulted && is_default_multi_node_command(&label) =>
            {
                Ok(Some(node_map(entries)))
            }
            // Case 3: nested record maps are containers; pass through as-is
            ClusterValue::Multi(entries) if is_nested_map_command(&label) => {
                Ok(Some(nested_map(entries)))
            }
            // Case 4: a misfiled single-node map; restore its binary keys
            ClusterValue::Multi(entries) => Ok(Some(restore_key_map(entries))),
            ClusterValue::Single(value) => Ok(Some(value)),
        }
    }
}
