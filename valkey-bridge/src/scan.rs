//! Scan cursor protocol
//!
//! Iteration commands return a cursor that tracks the server-side cursor
//! token (numeric, starting at `0`, finished when the server reports `0`
//! again) and buffers the current batch client-side. `next()` fetches the
//! next batch transparently when the buffer runs dry. Scanning is rejected
//! while a pipeline or transaction is collecting: the batches could not be
//! fetched incrementally.

use bytes::Bytes;
use std::collections::VecDeque;
use valkey_bridge_core::{
    error::{ValkeyError, ValkeyResult},
    reply::Reply,
};

use crate::adapter::UnifiedClient;
use crate::commands::{static_arg, uint_arg};
use crate::connection::{copy_arg, Connection};
use crate::convert::Conv;

/// Options for iteration commands
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pattern: Option<Bytes>,
    count: Option<u64>,
}

impl ScanOptions {
    /// No pattern, server-default batch size
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Only yield elements matching a glob pattern
    #[must_use]
    pub fn matching(mut self, pattern: &[u8]) -> Self {
        self.pattern = Some(Bytes::from(pattern.to_vec()));
        self
    }

    /// Batch-size hint passed to the server
    #[must_use]
    pub const fn count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub(crate) fn append_args(&self, args: &mut Vec<Bytes>) {
        if let Some(pattern) = &self.pattern {
            args.push(static_arg("MATCH"));
            args.push(pattern.clone());
        }
        if let Some(count) = self.count {
            args.push(static_arg("COUNT"));
            args.push(uint_arg(count));
        }
    }
}

/// Shared batch-fetching state of a cursor
struct CursorState {
    command: &'static str,
    key: Option<Bytes>,
    options: ScanOptions,
    cursor: u64,
    finished: bool,
}

impl CursorState {
    fn new(command: &'static str, key: Option<Bytes>, options: ScanOptions) -> Self {
        Self {
            command,
            key,
            options,
            cursor: 0,
            finished: false,
        }
    }

    /// Fetch the next batch, updating the cursor token
    async fn fetch<A: UnifiedClient>(
        &mut self,
        conn: &mut Connection<A>,
    ) -> ValkeyResult<Vec<Reply>> {
        conn.reject_when_queued(self.command)?;

        let mut args = Vec::new();
        if let Some(key) = &self.key {
            args.push(key.clone());
        }
        args.push(uint_arg(self.cursor));
        self.options.append_args(&mut args);

        let reply = conn
            .execute(self.command, args, Conv::Raw)
            .await?
            .ok_or_else(|| ValkeyError::Protocol("Scan batch was queued".to_string()))?;

        let Reply::Seq(mut parts) = reply else {
            return Err(ValkeyError::Type(format!(
                "Unexpected {} reply shape",
                self.command
            )));
        };
        if parts.len() != 2 {
            return Err(ValkeyError::Type(format!(
                "Unexpected {} reply arity: {}",
                self.command,
                parts.len()
            )));
        }

        let items = parts.pop().unwrap_or(Reply::Nil);
        let token = parts.pop().unwrap_or(Reply::Nil);

        self.cursor = match token {
            Reply::Bytes(b) => String::from_utf8_lossy(&b)
                .parse::<u64>()
                .map_err(|e| ValkeyError::Type(format!("Invalid cursor token: {e}")))?,
            Reply::Int(i) => i as u64,
            other => {
                return Err(ValkeyError::Type(format!(
                    "Invalid cursor token: {other:?}"
                )))
            }
        };
        if self.cursor == 0 {
            self.finished = true;
        }

        match items {
            Reply::Seq(items) => Ok(items),
            Reply::Nil => Ok(Vec::new()),
            other => Err(ValkeyError::Type(format!(
                "Unexpected {} batch shape: {other:?}",
                self.command
            ))),
        }
    }
}

/// Cursor over single elements (SCAN, SSCAN)
pub struct ScanCursor<'a, A: UnifiedClient> {
    conn: &'a mut Connection<A>,
    state: CursorState,
    buffer: VecDeque<Bytes>,
}

impl<'a, A: UnifiedClient> ScanCursor<'a, A> {
    fn new(
        conn: &'a mut Connection<A>,
        command: &'static str,
        key: Option<Bytes>,
        options: ScanOptions,
    ) -> Self {
        Self {
            conn,
            state: CursorState::new(command, key, options),
            buffer: VecDeque::new(),
        }
    }

    /// The server-side cursor token after the last fetched batch
    #[must_use]
    pub fn cursor_id(&self) -> u64 {
        self.state.cursor
    }

    /// Yield the next element, fetching batches as needed
    ///
    /// Resolves to `None` once the server reports the iteration complete
    /// and the buffer is drained.
    pub async fn next(&mut self) -> ValkeyResult<Option<Bytes>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }
            if self.state.finished {
                return Ok(None);
            }
            let batch = self.state.fetch(self.conn).await?;
            for item in batch {
                self.buffer.push_back(Bytes::try_from(item)?);
            }
        }
    }

    /// Drain the remaining elements into a vector
    pub async fn collect_all(mut self) -> ValkeyResult<Vec<Bytes>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }
}

/// Cursor over field/value pairs (HSCAN)
pub struct HashScanCursor<'a, A: UnifiedClient> {
    conn: &'a mut Connection<A>,
    state: CursorState,
    buffer: VecDeque<(Bytes, Bytes)>,
}

impl<'a, A: UnifiedClient> HashScanCursor<'a, A> {
    fn new(conn: &'a mut Connection<A>, key: Bytes, options: ScanOptions) -> Self {
        Self {
            conn,
            state: CursorState::new("HSCAN", Some(key), options),
            buffer: VecDeque::new(),
        }
    }

    /// The server-side cursor token after the last fetched batch
    #[must_use]
    pub fn cursor_id(&self) -> u64 {
        self.state.cursor
    }

    /// Yield the next field/value pair, fetching batches as needed
    pub async fn next(&mut self) -> ValkeyResult<Option<(Bytes, Bytes)>> {
        loop {
            if let Some(pair) = self.buffer.pop_front() {
                return Ok(Some(pair));
            }
            if self.state.finished {
                return Ok(None);
            }
            let batch = self.state.fetch(self.conn).await?;
            if batch.len() % 2 != 0 {
                return Err(ValkeyError::Type(
                    "HSCAN batches come in field/value pairs".to_string(),
                ));
            }
            let mut iter = batch.into_iter();
            while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
                self.buffer
                    .push_back((Bytes::try_from(field)?, Bytes::try_from(value)?));
            }
        }
    }

    /// Drain the remaining pairs into a vector
    pub async fn collect_all(mut self) -> ValkeyResult<Vec<(Bytes, Bytes)>> {
        let mut pairs = Vec::new();
        while let Some(pair) = self.next().await? {
            pairs.push(pair);
        }
        Ok(pairs)
    }
}

impl<A: UnifiedClient> Connection<A> {
    /// Iterate the keyspace
    pub fn scan(&mut self, options: ScanOptions) -> ScanCursor<'_, A> {
        ScanCursor::new(self, "SCAN", None, options)
    }

    /// Iterate the members of a set
    pub fn sscan(&mut self, key: &[u8], options: ScanOptions) -> ScanCursor<'_, A> {
        ScanCursor::new(self, "SSCAN", Some(copy_arg(key)), options)
    }

    /// Iterate the fields of a hash
    pub fn hscan(&mut self, key: &[u8], options: ScanOptions) -> HashScanCursor<'_, A> {
        HashScanCursor::new(self, copy_arg(key), options)
    }
}
