//! Contract types for the valkey-bridge binding layer
//!
//! This crate provides the fundamental types shared across the binding
//! layer: the error taxonomy, the raw reply shape produced by the native
//! drivers, the converted result variants returned to callers, the cluster
//! node snapshot types and the connection configuration.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod reply;
pub mod types;
pub mod value;

pub use config::{ConnectionConfig, TopologyMode};
pub use error::{ValkeyError, ValkeyResult};
pub use reply::{Outcome, Reply};
pub use types::{ClusterNode, LinkState, NodeType, SlotRange};
pub use value::Value;
