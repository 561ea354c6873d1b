//! Connection façade and mode state machine
//!
//! A [`Connection`] is a per-session façade over a [`UnifiedClient`]. It
//! starts in direct mode, where every command is a blocking round trip.
//! `open_pipeline()` and `multi()` switch it into a queuing mode: every
//! command call is captured (with its result converter) and resolves to
//! [`Outcome::Queued`]; `close_pipeline()`/`exec()` flush the batch in one
//! round trip and return the converted results in enqueue order. The
//! terminal state is always direct mode.
//!
//! A connection holds mutable per-session state with no internal locking
//! and takes `&mut self` for every command; obtain one connection per
//! logical unit of work.

use bytes::Bytes;
use tracing::debug;
use valkey_bridge_core::{
    config::ConnectionConfig,
    error::{ValkeyError, ValkeyResult},
    reply::{Outcome, Reply},
};

use crate::adapter::{BatchStatus, UnifiedClient};
use crate::convert::Conv;
use crate::protocol::command_args;

/// Result list of a flushed pipeline or transaction: one entry per queued
/// command, in enqueue order, with per-command failures captured in place
pub type BatchResults = Vec<ValkeyResult<Reply>>;

/// A per-session connection to a Valkey deployment
pub struct Connection<A: UnifiedClient> {
    client: A,
    config: ConnectionConfig,
    converters: Vec<Conv>,
    watched_keys: Vec<Bytes>,
    closed: bool,
}

impl<A: UnifiedClient> Connection<A> {
    /// Create a new connection over the given adapter
    pub fn new(client: A, config: ConnectionConfig) -> Self {
        Self {
            client,
            config,
            converters: Vec::new(),
            watched_keys: Vec::new(),
            closed: false,
        }
    }

    /// The connection configuration
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub(crate) fn client_mut(&mut self) -> &mut A {
        &mut self.client
    }

    /// Check whether a pipeline is collecting
    #[must_use]
    pub fn is_pipelined(&self) -> bool {
        self.client.batch_status() == BatchStatus::Pipeline
    }

    /// Check whether a transaction is collecting
    #[must_use]
    pub fn is_queueing(&self) -> bool {
        self.client.batch_status() == BatchStatus::Transaction
    }

    /// Check whether the connection has been closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the connection
    ///
    /// Any batch still collecting is discarded. The native client may be
    /// pooled and is not torn down here.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.client.discard_batch();
            self.converters.clear();
            self.client.close();
        }
    }

    fn verify_open(&self) -> ValkeyResult<()> {
        if self.closed {
            return Err(ValkeyError::Usage("Connection is closed".to_string()));
        }
        Ok(())
    }

    pub(crate) fn reject_when_queued(&self, what: &str) -> ValkeyResult<()> {
        if self.is_queueing() || self.is_pipelined() {
            return Err(ValkeyError::Usage(format!(
                "'{what}' cannot be called in pipeline / transaction mode"
            )));
        }
        Ok(())
    }

    /// Execute a command, honoring the connection's current mode
    ///
    /// In direct mode the command is dispatched immediately and the raw
    /// reply converted via `conv`. While a pipeline or transaction is
    /// collecting, the command and its converter are queued and `Ok(None)`
    /// is returned; converted results arrive positionally from
    /// [`close_pipeline`](Self::close_pipeline) / [`exec`](Self::exec).
    /// Callers must ignore the return value while queuing.
    ///
    /// # Errors
    ///
    /// Returns a usage error on a closed connection, or the transport,
    /// server or conversion error of an immediate dispatch.
    pub async fn execute(
        &mut self,
        command: &str,
        args: Vec<Bytes>,
        conv: Conv,
    ) -> ValkeyResult<Option<Reply>> {
        self.verify_open()?;

        let frame = command_args(command, args);

        if self.is_queueing() || self.is_pipelined() {
            // Record the converter for positional conversion at flush time
            self.converters.push(conv);
            if let Err(err) = self.client.invoke(frame).await {
                self.converters.pop();
                return Err(err);
            }
            return Ok(None);
        }

        let raw = self.client.invoke(frame).await?.ok_or_else(|| {
            ValkeyError::Protocol("Driver queued a command outside batch mode".to_string())
        })?;
        conv.apply(raw).map(Some)
    }

    /// Switch the connection into pipeline mode
    ///
    /// A no-op when a pipeline is already collecting.
    ///
    /// # Errors
    ///
    /// Returns a usage error while a transaction is active, or when the
    /// underlying client cannot batch.
    pub fn open_pipeline(&mut self) -> ValkeyResult<()> {
        self.verify_open()?;
        if self.is_queueing() {
            return Err(ValkeyError::Usage(
                "Cannot use pipelining while a transaction is active".to_string(),
            ));
        }
        if !self.is_pipelined() {
            debug!("opening pipeline");
            self.client.start_batch(false)?;
        }
        Ok(())
    }

    /// Flush the pipeline and leave pipeline mode
    ///
    /// Returns the converted results in enqueue order. Per-command
    /// failures are captured positionally unless
    /// [`ConnectionConfig::fail_fast_pipeline`] is set. Returns an empty
    /// list when no pipeline was open or nothing was queued.
    ///
    /// # Errors
    ///
    /// Returns the transport error that failed the round trip; the
    /// connection is back in direct mode regardless.
    pub async fn close_pipeline(&mut self) -> ValkeyResult<BatchResults> {
        self.verify_open()?;
        if !self.is_pipelined() {
            return Ok(Vec::new());
        }

        if self.client.batch_len()? == 0 {
            self.client.discard_batch();
            self.converters.clear();
            return Ok(Vec::new());
        }

        debug!(queued = self.converters.len(), "flushing pipeline");
        let flushed = self.client.exec_batch().await;
        self.client.discard_batch();
        let converters = std::mem::take(&mut self.converters);

        let entries = flushed?.unwrap_or_default();
        self.convert_batch(entries, converters, self.config.fail_fast_pipeline)
    }

    /// Switch the connection into transaction mode
    ///
    /// A no-op when a transaction is already collecting.
    ///
    /// # Errors
    ///
    /// Returns a usage error while a pipeline is open, or when the
    /// underlying client cannot batch.
    pub fn multi(&mut self) -> ValkeyResult<()> {
        self.verify_open()?;
        if self.is_pipelined() {
            return Err(ValkeyError::Usage(
                "Cannot use transaction while a pipeline is open".to_string(),
            ));
        }
        if !self.is_queueing() {
            debug!("starting transaction");
            self.client.start_batch(true)?;
        }
        Ok(())
    }

    /// Execute the transaction and leave transaction mode
    ///
    /// Returns the converted results in enqueue order. An **empty** list
    /// signals that the transaction was aborted because a watched key
    /// changed (or that nothing was queued); it is never an error. Watches
    /// are cleared either way.
    ///
    /// # Errors
    ///
    /// Returns a usage error when no transaction is active, or the
    /// transport error that failed the round trip.
    pub async fn exec(&mut self) -> ValkeyResult<BatchResults> {
        self.verify_open()?;
        if !self.is_queueing() {
            return Err(ValkeyError::Usage(
                "No ongoing transaction; did you forget to call multi()?".to_string(),
            ));
        }

        if self.client.batch_len()? == 0 {
            self.client.discard_batch();
            self.converters.clear();
            self.watched_keys.clear();
            return Ok(Vec::new());
        }

        debug!(queued = self.converters.len(), "executing transaction");
        let flushed = self.client.exec_batch().await;
        self.client.discard_batch();
        let converters = std::mem::take(&mut self.converters);
        // Watches are consumed by EXEC on the server either way
        self.watched_keys.clear();

        match flushed? {
            // Abort because a watched key changed: empty result list
            None => Ok(Vec::new()),
            Some(entries) => self.convert_batch(entries, converters, false),
        }
    }

    /// Abandon the transaction without executing it
    ///
    /// # Errors
    ///
    /// Returns a usage error when no transaction is active.
    pub fn discard(&mut self) -> ValkeyResult<()> {
        self.verify_open()?;
        if !self.is_queueing() {
            return Err(ValkeyError::Usage(
                "No ongoing transaction; did you forget to call multi()?".to_string(),
            ));
        }
        self.client.discard_batch();
        self.converters.clear();
        Ok(())
    }

    fn convert_batch(
        &self,
        entries: Vec<ValkeyResult<valkey_bridge_core::value::Value>>,
        converters: Vec<Conv>,
        fail_fast: bool,
    ) -> ValkeyResult<BatchResults> {
        if entries.len() != converters.len() {
            return Err(ValkeyError::Protocol(format!(
                "Batch returned {} results for {} queued commands",
                entries.len(),
                converters.len()
            )));
        }

        let mut results = Vec::with_capacity(entries.len());
        for (entry, conv) in entries.into_iter().zip(converters) {
            let converted = entry.and_then(|raw| conv.apply(raw));
            if fail_fast {
                results.push(Ok(converted?));
            } else {
                results.push(converted);
            }
        }
        Ok(results)
    }

    /// Register keys for optimistic-lock invalidation of the next
    /// transaction
    ///
    /// Executed immediately at the server; any watched key mutated by any
    /// client before [`exec`](Self::exec) aborts the transaction.
    ///
    /// # Errors
    ///
    /// Returns a usage error during an active transaction.
    pub async fn watch(&mut self, keys: Vec<Bytes>) -> ValkeyResult<()> {
        if keys.is_empty() {
            return Err(ValkeyError::Usage(
                "WATCH requires at least one key".to_string(),
            ));
        }
        if self.is_queueing() {
            return Err(ValkeyError::Usage(
                "WATCH is not allowed during MULTI".to_string(),
            ));
        }

        self.watched_keys.extend(keys.iter().cloned());
        self.execute("WATCH", keys, Conv::Status).await?;
        Ok(())
    }

    /// Drop all watches
    ///
    /// A no-op when nothing is watched.
    ///
    /// # Errors
    ///
    /// Returns the transport error of the UNWATCH round trip.
    pub async fn unwatch(&mut self) -> ValkeyResult<()> {
        if self.watched_keys.is_empty() {
            return Ok(());
        }
        let outcome = self.execute("UNWATCH", Vec::new(), Conv::Status).await;
        self.watched_keys.clear();
        outcome.map(|_| ())
    }

    /// Keys currently registered for watch invalidation
    #[must_use]
    pub fn watched_keys(&self) -> &[Bytes] {
        &self.watched_keys
    }

    /// Ping the server
    pub async fn ping(&mut self) -> ValkeyResult<Outcome<String>> {
        finish(self.execute("PING", Vec::new(), Conv::Status).await?)
    }

    /// Echo a message back from the server
    pub async fn echo(&mut self, message: &[u8]) -> ValkeyResult<Outcome<Bytes>> {
        finish(
            self.execute("ECHO", vec![copy_arg(message)], Conv::OptionalBytes)
                .await?,
        )
    }

    /// Select the logical database
    pub async fn select(&mut self, db_index: u8) -> ValkeyResult<Outcome<bool>> {
        finish(
            self.execute(
                "SELECT",
                vec![Bytes::from(db_index.to_string().into_bytes())],
                Conv::OkBool,
            )
            .await?,
        )
    }

    /// Publish a message to a channel, returning the receiver count
    pub async fn publish(&mut self, channel: &[u8], message: &[u8]) -> ValkeyResult<Outcome<i64>> {
        finish(
            self.execute(
                "PUBLISH",
                vec![copy_arg(channel), copy_arg(message)],
                Conv::Int,
            )
            .await?,
        )
    }

    /// Subscription management is not part of this layer
    ///
    /// # Errors
    ///
    /// Always returns a usage error; use a dedicated subscriber client.
    pub fn subscribe(&mut self, _channels: &[&[u8]]) -> ValkeyResult<()> {
        Err(ValkeyError::Usage(
            "Dynamic subscriptions are not supported on this connection".to_string(),
        ))
    }
}

/// Finalize a typed command: unwrap the queued marker or narrow the reply
pub(crate) fn finish<T>(reply: Option<Reply>) -> ValkeyResult<Outcome<T>>
where
    T: TryFrom<Reply, Error = ValkeyError>,
{
    match reply {
        Some(reply) => Ok(Outcome::Done(T::try_from(reply)?)),
        None => Ok(Outcome::Queued),
    }
}

/// Copy a caller-borrowed argument into an owned frame argument
pub(crate) fn copy_arg(arg: &[u8]) -> Bytes {
    Bytes::from(arg.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::StandaloneAdapter;
    use crate::driver::{BatchEntry, NativeClient};
    use async_trait::async_trait;
    use valkey_bridge_core::value::Value;

    /// Driver double replying OK to everything and echoing batches back
    struct OkClient {
        abort_exec: bool,
    }

    #[async_trait]
    impl NativeClient for OkClient {
        async fn request(&mut self, _args: Vec<Bytes>) -> ValkeyResult<Value> {
            Ok(Value::Simple("OK".to_string()))
        }

        async fn request_batch(
            &mut self,
            commands: Vec<Vec<Bytes>>,
            atomic: bool,
        ) -> ValkeyResult<Option<Vec<BatchEntry>>> {
            if atomic && self.abort_exec {
                return Ok(None);
            }
            Ok(Some(
                commands
                    .iter()
                    .map(|_| Ok(Value::Simple("OK".to_string())))
                    .collect(),
            ))
        }
    }

    fn connection(abort_exec: bool) -> Connection<StandaloneAdapter> {
        Connection::new(
            StandaloneAdapter::new(Box::new(OkClient { abort_exec })),
            ConnectionConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_mode_transitions_are_guarded() {
        let mut conn = connection(false);

        conn.multi().unwrap();
        let err = conn.open_pipeline().unwrap_err();
        assert!(err.is_usage());
        conn.discard().unwrap();

        conn.open_pipeline().unwrap();
        let err = conn.multi().unwrap_err();
        assert!(err.is_usage());
        conn.close_pipeline().await.unwrap();
    }

    #[tokio::test]
    async fn test_reopening_same_mode_is_noop() {
        let mut conn = connection(false);
        conn.open_pipeline().unwrap();
        conn.open_pipeline().unwrap();
        assert!(conn.is_pipelined());
        conn.close_pipeline().await.unwrap();
        assert!(!conn.is_pipelined());
    }

    #[tokio::test]
    async fn test_exec_without_multi_is_usage_error() {
        let mut conn = connection(false);
        assert!(conn.exec().await.unwrap_err().is_usage());
        assert!(conn.discard().unwrap_err().is_usage());
    }

    #[tokio::test]
    async fn test_empty_flushes_return_empty_lists() {
        let mut conn = connection(false);

        conn.open_pipeline().unwrap();
        assert!(conn.close_pipeline().await.unwrap().is_empty());
        assert!(!conn.is_pipelined());

        conn.multi().unwrap();
        assert!(conn.exec().await.unwrap().is_empty());
        assert!(!conn.is_queueing());
    }

    #[tokio::test]
    async fn test_watch_abort_yields_empty_list() {
        let mut conn = connection(true);
        conn.watch(vec![Bytes::from_static(b"k")]).await.unwrap();
        conn.multi().unwrap();
        assert!(conn.ping().await.unwrap().is_queued());
        let results = conn.exec().await.unwrap();
        assert!(results.is_empty());
        assert!(conn.watched_keys().is_empty());
    }

    #[tokio::test]
    async fn test_watch_during_multi_rejected() {
        let mut conn = connection(false);
        conn.multi().unwrap();
        let err = conn.watch(vec![Bytes::from_static(b"k")]).await.unwrap_err();
        assert!(err.is_usage());
    }

    #[tokio::test]
    async fn test_closed_connection_rejects_commands() {
        let mut conn = connection(false);
        conn.close();
        assert!(conn.is_closed());
        assert!(conn.ping().await.unwrap_err().is_usage());
        assert!(conn.open_pipeline().unwrap_err().is_usage());
    }
}
