//! Unified client adapter
//!
//! [`UnifiedClient`] presents one calling convention over the heterogeneous
//! native clients: issue a command and get back a raw value (or a queued
//! marker), plus a batch lifecycle for pipelines and transactions. The
//! connection layer talks only to this trait and never sees which native
//! client sits underneath.

use async_trait::async_trait;
use bytes::Bytes;
use valkey_bridge_core::error::{ValkeyError, ValkeyResult};
use valkey_bridge_core::value::Value;

use crate::driver::{BatchEntry, NativeClient};

/// Batch collection state of an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// No batch in progress; commands execute immediately
    None,
    /// Commands are collected for a single non-atomic round trip
    Pipeline,
    /// Commands are collected for an atomic MULTI/EXEC round trip
    Transaction,
}

/// One calling convention over standalone and cluster native clients
#[async_trait]
pub trait UnifiedClient: Send {
    /// Current batch collection state
    fn batch_status(&self) -> BatchStatus;

    /// Number of commands collected into the current batch
    ///
    /// # Errors
    ///
    /// Returns a usage error when no batch is in progress.
    fn batch_len(&self) -> ValkeyResult<usize>;

    /// Start collecting a new batch
    ///
    /// # Errors
    ///
    /// Returns a usage error when batching is unsupported by this client.
    fn start_batch(&mut self, atomic: bool) -> ValkeyResult<()>;

    /// Flush the collected batch in one round trip
    ///
    /// Results arrive positionally, per-command errors captured in place.
    /// Resolves to `None` when an atomic batch was aborted because a
    /// watched key changed.
    ///
    /// # Errors
    ///
    /// Returns a usage error when no batch is in progress, or the transport
    /// error that failed the round trip.
    async fn exec_batch(&mut self) -> ValkeyResult<Option<Vec<BatchEntry>>>;

    /// Drop the collected batch and leave batch mode
    fn discard_batch(&mut self);

    /// Issue one command
    ///
    /// Returns `Ok(None)` when a batch is collecting (the command was
    /// appended), otherwise the raw reply.
    async fn invoke(&mut self, args: Vec<Bytes>) -> ValkeyResult<Option<Value>>;

    /// Release the adapter
    ///
    /// The native client may be pooled and shared; its lifecycle belongs to
    /// the pool, so this never closes it.
    fn close(&mut self) {}
}

/// Adapter over a single-node native client
pub struct StandaloneAdapter {
    client: Box<dyn NativeClient>,
    batch: Option<Vec<Vec<Bytes>>>,
    status: BatchStatus,
}

impl StandaloneAdapter {
    /// Create a new adapter over the given native client
    pub fn new(client: Box<dyn NativeClient>) -> Self {
        Self {
            client,
            batch: None,
            status: BatchStatus::None,
        }
    }
}

#[async_trait]
impl UnifiedClient for StandaloneAdapter {
    fn batch_status(&self) -> BatchStatus {
        self.status
    }

    fn batch_len(&self) -> ValkeyResult<usize> {
        self.batch
            .as_ref()
            .map(Vec::len)
            .ok_or_else(|| ValkeyError::Usage("No batch in progress".to_string()))
    }

    fn start_batch(&mut self, atomic: bool) -> ValkeyResult<()> {
        self.batch = Some(Vec::new());
        self.status = if atomic {
            BatchStatus::Transaction
        } else {
            BatchStatus::Pipeline
        };
        Ok(())
    }

    async fn exec_batch(&mut self) -> ValkeyResult<Option<Vec<BatchEntry>>> {
        let commands = self
            .batch
            .take()
            .ok_or_else(|| ValkeyError::Usage("No batch in progress".to_string()))?;
        let atomic = self.status == BatchStatus::Transaction;
        self.client.request_batch(commands, atomic).await
    }

    fn discard_batch(&mut self) {
        self.batch = None;
        self.status = BatchStatus::None;
    }

    async fn invoke(&mut self, args: Vec<Bytes>) -> ValkeyResult<Option<Value>> {
        if let Some(batch) = self.batch.as_mut() {
            batch.push(args);
            return Ok(None);
        }
        self.client.request(args).await.map(Some)
    }
}
