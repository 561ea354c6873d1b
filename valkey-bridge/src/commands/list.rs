//! List commands

use bytes::Bytes;
use std::time::Duration;
use valkey_bridge_core::{error::ValkeyResult, reply::Outcome, reply::Reply};

use super::{float_arg, int_arg};
use crate::adapter::UnifiedClient;
use crate::connection::{copy_arg, finish, Connection};
use crate::convert::Conv;

impl<A: UnifiedClient> Connection<A> {
    /// Push values onto the head of a list, returning the new length
    pub async fn lpush(&mut self, key: &[u8], values: &[&[u8]]) -> ValkeyResult<Outcome<i64>> {
        let mut args = vec![copy_arg(key)];
        args.extend(values.iter().map(|value| copy_arg(value)));
        finish(self.execute("LPUSH", args, Conv::Int).await?)
    }

    /// Push values onto the tail of a list, returning the new length
    pub async fn rpush(&mut self, key: &[u8], values: &[&[u8]]) -> ValkeyResult<Outcome<i64>> {
        let mut args = vec![copy_arg(key)];
        args.extend(values.iter().map(|value| copy_arg(value)));
        finish(self.execute("RPUSH", args, Conv::Int).await?)
    }

    /// Pop a value from the head of a list
    pub async fn lpop(&mut self, key: &[u8]) -> ValkeyResult<Outcome<Option<Bytes>>> {
        finish(self.execute("LPOP", vec![copy_arg(key)], Conv::OptionalBytes).await?)
    }

    /// Pop a value from the tail of a list
    pub async fn rpop(&mut self, key: &[u8]) -> ValkeyResult<Outcome<Option<Bytes>>> {
        finish(self.execute("RPOP", vec![copy_arg(key)], Conv::OptionalBytes).await?)
    }

    /// Range of list elements by inclusive indices
    pub async fn lrange(&mut self, key: &[u8], start: i64, stop: i64) -> ValkeyResult<Outcome<Vec<Bytes>>> {
        finish(
            self.execute(
                "LRANGE",
                vec![copy_arg(key), int_arg(start), int_arg(stop)],
                Conv::BytesSeq,
            )
            .await?,
        )
    }

    /// Length of a list
    pub async fn llen(&mut self, key: &[u8]) -> ValkeyResult<Outcome<i64>> {
        finish(self.execute("LLEN", vec![copy_arg(key)], Conv::Int).await?)
    }

    /// Element at a list index
    pub async fn lindex(&mut self, key: &[u8], index: i64) -> ValkeyResult<Outcome<Option<Bytes>>> {
        finish(
            self.execute("LINDEX", vec![copy_arg(key), int_arg(index)], Conv::OptionalBytes)
                .await?,
        )
    }

    /// Set the element at a list index
    pub async fn lset(&mut self, key: &[u8], index: i64, value: &[u8]) -> ValkeyResult<Outcome<bool>> {
        finish(
            self.execute(
                "LSET",
                vec![copy_arg(key), int_arg(index), copy_arg(value)],
                Conv::OkBool,
            )
            .await?,
        )
    }

    /// Remove occurrences of a value from a list, returning how many were
    /// removed
    pub async fn lrem(&mut self, key: &[u8], count: i64, value: &[u8]) -> ValkeyResult<Outcome<i64>> {
        finish(
            self.execute(
                "LREM",
                vec![copy_arg(key), int_arg(count), copy_arg(value)],
                Conv::Int,
            )
            .await?,
        )
    }

    /// Pop from the head of the first non-empty list, blocking up to the
    /// given timeout
    ///
    /// Yields the `(key, value)` popped, or `None` on timeout. Blocks only
    /// the calling task. Rejected while a pipeline or transaction is
    /// collecting: execution would happen at flush time, making the
    /// blocking wait meaningless.
    pub async fn blpop(
        &mut self,
        keys: &[&[u8]],
        timeout: Duration,
    ) -> ValkeyResult<Outcome<Option<(Bytes, Bytes)>>> {
        self.blocking_pop("BLPOP", keys, timeout).await
    }

    /// Pop from the tail of the first non-empty list, blocking up to the
    /// given timeout
    ///
    /// Same contract as [`blpop`](Self::blpop).
    pub async fn brpop(
        &mut self,
        keys: &[&[u8]],
        timeout: Duration,
    ) -> ValkeyResult<Outcome<Option<(Bytes, Bytes)>>> {
        self.blocking_pop("BRPOP", keys, timeout).await
    }

    async fn blocking_pop(
        &mut self,
        command: &str,
        keys: &[&[u8]],
        timeout: Duration,
    ) -> ValkeyResult<Outcome<Option<(Bytes, Bytes)>>> {
        self.reject_when_queued(command)?;

        let mut args: Vec<Bytes> = keys.iter().map(|key| copy_arg(key)).collect();
        args.push(float_arg(timeout.as_secs_f64()));

        match self.execute(command, args, Conv::Raw).await? {
            None => Ok(Outcome::Queued),
            Some(Reply::Nil) => Ok(Outcome::Done(None)),
            Some(Reply::Seq(items)) if items.len() == 2 => {
                let mut items = items.into_iter();
                let key = Bytes::try_from(items.next().unwrap_or(Reply::Nil))?;
                let value = Bytes::try_from(items.next().unwrap_or(Reply::Nil))?;
                Ok(Outcome::Done(Some((key, value))))
            }
            Some(other) => Err(valkey_bridge_core::error::ValkeyError::Type(format!(
                "Unexpected {command} reply: {other:?}"
            ))),
        }
    }
}
