//! Stream commands
//!
//! Stream replies are nested: ranges yield record lists, reads yield a map
//! of stream key to record list. The nested shapes pass through the
//! adapter untouched (see [`crate::routing::is_nested_map_command`]) and
//! are parsed here.

use bytes::Bytes;
use valkey_bridge_core::{
    error::{ValkeyError, ValkeyResult},
    reply::{Outcome, Reply},
};

use super::{static_arg, uint_arg};
use crate::adapter::UnifiedClient;
use crate::connection::{copy_arg, finish, Connection};
use crate::convert::Conv;

/// One stream record: its ID and its field/value pairs in insertion order
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    /// Record ID ("<ms>-<seq>")
    pub id: String,
    /// Field/value pairs
    pub fields: Vec<(Bytes, Bytes)>,
}

impl StreamEntry {
    fn from_reply(reply: Reply) -> ValkeyResult<Self> {
        match reply {
            // Range shape: [id, [field, value, ...]]
            Reply::Seq(parts) if parts.len() == 2 => {
                let mut parts = parts.into_iter();
                let id = String::try_from(parts.next().unwrap_or(Reply::Nil))?;
                let fields = field_pairs(parts.next().unwrap_or(Reply::Nil))?;
                Ok(Self { id, fields })
            }
            other => Err(ValkeyError::Type(format!(
                "Unexpected stream entry shape: {other:?}"
            ))),
        }
    }

    fn list_from_reply(reply: Reply) -> ValkeyResult<Vec<Self>> {
        match reply {
            Reply::Nil => Ok(Vec::new()),
            Reply::Seq(items) => items.into_iter().map(Self::from_reply).collect(),
            // Record-map shape: {id => [field, value, ...]}
            Reply::Map(entries) => entries
                .into_iter()
                .map(|(id, fields)| {
                    Ok(Self {
                        id: String::from_utf8_lossy(&id).into_owned(),
                        fields: field_pairs(fields)?,
                    })
                })
                .collect(),
            other => Err(ValkeyError::Type(format!(
                "Unexpected stream entry list shape: {other:?}"
            ))),
        }
    }
}

fn field_pairs(reply: Reply) -> ValkeyResult<Vec<(Bytes, Bytes)>> {
    match reply {
        Reply::Nil => Ok(Vec::new()),
        Reply::Map(entries) => entries
            .into_iter()
            .map(|(field, value)| Ok((field, Bytes::try_from(value)?)))
            .collect(),
        Reply::Seq(items) => {
            if items.len() % 2 != 0 {
                return Err(ValkeyError::Type(
                    "Stream fields come in pairs".to_string(),
                ));
            }
            let mut pairs = Vec::with_capacity(items.len() / 2);
            let mut iter = items.into_iter();
            while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
                pairs.push((Bytes::try_from(field)?, Bytes::try_from(value)?));
            }
            Ok(pairs)
        }
        other => Err(ValkeyError::Type(format!(
            "Unexpected stream field shape: {other:?}"
        ))),
    }
}

fn parse_read_reply(reply: Reply) -> ValkeyResult<Vec<(Bytes, Vec<StreamEntry>)>> {
    match reply {
        Reply::Nil => Ok(Vec::new()),
        // Keyed shape: {stream => entries}
        Reply::Map(entries) => entries
            .into_iter()
            .map(|(stream, records)| Ok((stream, StreamEntry::list_from_reply(records)?)))
            .collect(),
        // Legacy shape: [[stream, entries], ...]
        Reply::Seq(items) => items
            .into_iter()
            .map(|item| match item {
                Reply::Seq(pair) if pair.len() == 2 => {
                    let mut pair = pair.into_iter();
                    let stream = Bytes::try_from(pair.next().unwrap_or(Reply::Nil))?;
                    let records = StreamEntry::list_from_reply(pair.next().unwrap_or(Reply::Nil))?;
                    Ok((stream, records))
                }
                other => Err(ValkeyError::Type(format!(
                    "Unexpected XREAD stream shape: {other:?}"
                ))),
            })
            .collect(),
        other => Err(ValkeyError::Type(format!(
            "Unexpected XREAD reply shape: {other:?}"
        ))),
    }
}

impl<A: UnifiedClient> Connection<A> {
    /// Append a record to a stream, returning its generated ID
    ///
    /// Pass `"*"` as `id` to let the server assign one.
    pub async fn xadd(
        &mut self,
        key: &[u8],
        id: &str,
        fields: &[(&[u8], &[u8])],
    ) -> ValkeyResult<Outcome<String>> {
        let mut args = vec![copy_arg(key), copy_arg(id.as_bytes())];
        for (field, value) in fields {
            args.push(copy_arg(field));
            args.push(copy_arg(value));
        }
        finish(self.execute("XADD", args, Conv::Status).await?)
    }

    /// Number of records in a stream
    pub async fn xlen(&mut self, key: &[u8]) -> ValkeyResult<Outcome<i64>> {
        finish(self.execute("XLEN", vec![copy_arg(key)], Conv::Int).await?)
    }

    /// Records in an inclusive ID range, oldest first
    ///
    /// Pass `"-"`/`"+"` for the open ends.
    pub async fn xrange(
        &mut self,
        key: &[u8],
        start: &str,
        end: &str,
        count: Option<u64>,
    ) -> ValkeyResult<Outcome<Vec<StreamEntry>>> {
        let mut args = vec![copy_arg(key), copy_arg(start.as_bytes()), copy_arg(end.as_bytes())];
        if let Some(count) = count {
            args.push(static_arg("COUNT"));
            args.push(uint_arg(count));
        }
        match self.execute("XRANGE", args, Conv::Raw).await? {
            None => Ok(Outcome::Queued),
            Some(reply) => Ok(Outcome::Done(StreamEntry::list_from_reply(reply)?)),
        }
    }

    /// Records in an inclusive ID range, newest first
    pub async fn xrevrange(
        &mut self,
        key: &[u8],
        end: &str,
        start: &str,
        count: Option<u64>,
    ) -> ValkeyResult<Outcome<Vec<StreamEntry>>> {
        let mut args = vec![copy_arg(key), copy_arg(end.as_bytes()), copy_arg(start.as_bytes())];
        if let Some(count) = count {
            args.push(static_arg("COUNT"));
            args.push(uint_arg(count));
        }
        match self.execute("XREVRANGE", args, Conv::Raw).await? {
            None => Ok(Outcome::Queued),
            Some(reply) => Ok(Outcome::Done(StreamEntry::list_from_reply(reply)?)),
        }
    }

    /// Read new records from streams, per stream
    ///
    /// `streams` pairs each stream key with the last seen ID (`"0"` reads
    /// from the beginning). Non-blocking form; the blocking variant is
    /// rejected while queuing like the other blocking operations.
    pub async fn xread(
        &mut self,
        streams: &[(&[u8], &str)],
        count: Option<u64>,
    ) -> ValkeyResult<Outcome<Vec<(Bytes, Vec<StreamEntry>)>>> {
        let mut args = Vec::new();
        if let Some(count) = count {
            args.push(static_arg("COUNT"));
            args.push(uint_arg(count));
        }
        args.push(static_arg("STREAMS"));
        args.extend(streams.iter().map(|(key, _)| copy_arg(key)));
        args.extend(streams.iter().map(|(_, id)| copy_arg(id.as_bytes())));

        match self.execute("XREAD", args, Conv::Raw).await? {
            None => Ok(Outcome::Queued),
            Some(reply) => Ok(Outcome::Done(parse_read_reply(reply)?)),
        }
    }

    /// Delete records by ID, returning how many were removed
    pub async fn xdel(&mut self, key: &[u8], ids: &[&str]) -> ValkeyResult<Outcome<i64>> {
        let mut args = vec![copy_arg(key)];
        args.extend(ids.iter().map(|id| copy_arg(id.as_bytes())));
        finish(self.execute("XDEL", args, Conv::Int).await?)
    }

    /// Trim a stream to at most the given length, returning how many
    /// records were evicted
    pub async fn xtrim(&mut self, key: &[u8], max_len: u64) -> ValkeyResult<Outcome<i64>> {
        finish(
            self.execute(
                "XTRIM",
                vec![copy_arg(key), static_arg("MAXLEN"), uint_arg(max_len)],
                Conv::Int,
            )
            .await?,
        )
    }
}
