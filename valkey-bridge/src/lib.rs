//! Unified Valkey data-access binding layer
//!
//! `valkey-bridge` lets applications talk to a Valkey (or Redis)
//! deployment through one serialization-aware connection surface,
//! regardless of whether the underlying native client is a single-node
//! client or a cluster client with its own routing engine.
//!
//! # Architecture
//!
//! - [`driver`] pins down the native-client calling conventions;
//!   [`tcp::TcpClient`] and [`cluster_client::ClusterTcpClient`] are the
//!   in-repo wire clients.
//! - [`adapter`] and [`cluster_adapter`] unify those shapes behind one
//!   [`adapter::UnifiedClient`] contract, including the repair of the
//!   cluster client's result-shape misclassification.
//! - [`connection::Connection`] is the per-session façade: direct mode
//!   executes immediately, pipeline/transaction mode queues commands that
//!   resolve to [`Outcome::Queued`] until the batch is flushed.
//! - [`cluster_connection::ClusterConnection`] adds node targeting,
//!   cluster-wide fan-out with per-command aggregation, and topology
//!   access.
//!
//! # Quick start
//!
//! ```no_run
//! use valkey_bridge::{ConnectionConfig, ConnectionFactory};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let factory = ConnectionFactory::new(ConnectionConfig::new("valkey://localhost:6379"));
//! let mut conn = factory.standalone_connection().await?;
//!
//! conn.set(b"greeting", b"hello").await?.done()?;
//! let value = conn.get(b"greeting").await?.done()?;
//! println!("greeting = {value:?}");
//!
//! // Pipeline: every call resolves to Queued, results arrive together
//! conn.open_pipeline()?;
//! conn.incr(b"counter").await?;
//! conn.incr(b"counter").await?;
//! let results = conn.close_pipeline().await?;
//! assert_eq!(results.len(), 2);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod adapter;
pub mod cluster_adapter;
pub mod cluster_client;
pub mod cluster_connection;
pub mod commands;
pub mod connection;
pub mod convert;
pub mod driver;
pub mod factory;
pub mod health;
pub mod protocol;
pub mod routing;
pub mod scan;
pub mod tcp;
pub mod topology;

pub use valkey_bridge_core::{
    config::{ConnectionConfig, TopologyMode},
    error::{ValkeyError, ValkeyResult},
    reply::{Outcome, Reply},
    types::{ClusterNode, LinkState, NodeType, SlotRange},
    value::Value,
};

pub use adapter::{BatchStatus, StandaloneAdapter, UnifiedClient};
pub use cluster_adapter::ClusterAdapter;
pub use cluster_client::ClusterTcpClient;
pub use cluster_connection::{ClusterConnection, SetSlotMode};
pub use connection::{BatchResults, Connection};
pub use convert::Conv;
pub use driver::{ClusterValue, NativeClient, NativeClusterClient, Route};
pub use factory::{ConnectionFactory, NodeClientCache, StandaloneConnection};
pub use health::{Health, HealthStatus};
pub use scan::{HashScanCursor, ScanCursor, ScanOptions};
pub use tcp::TcpClient;
pub use topology::{calculate_slot, ClusterTopology, CLUSTER_SLOTS};
