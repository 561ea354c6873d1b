//! Generic key commands

use bytes::Bytes;
use std::time::Duration;
use valkey_bridge_core::{error::ValkeyResult, reply::Outcome};

use super::uint_arg;
use crate::adapter::UnifiedClient;
use crate::connection::{copy_arg, finish, Connection};
use crate::convert::Conv;

impl<A: UnifiedClient> Connection<A> {
    /// Delete keys, returning how many existed
    pub async fn del(&mut self, keys: &[&[u8]]) -> ValkeyResult<Outcome<i64>> {
        let args = keys.iter().map(|key| copy_arg(key)).collect();
        finish(self.execute("DEL", args, Conv::Int).await?)
    }

    /// Delete keys asynchronously on the server, returning how many existed
    pub async fn unlink(&mut self, keys: &[&[u8]]) -> ValkeyResult<Outcome<i64>> {
        let args = keys.iter().map(|key| copy_arg(key)).collect();
        finish(self.execute("UNLINK", args, Conv::Int).await?)
    }

    /// Count how many of the given keys exist
    pub async fn exists(&mut self, keys: &[&[u8]]) -> ValkeyResult<Outcome<i64>> {
        let args = keys.iter().map(|key| copy_arg(key)).collect();
        finish(self.execute("EXISTS", args, Conv::Int).await?)
    }

    /// Set a key's time to live in seconds
    pub async fn expire(&mut self, key: &[u8], ttl: Duration) -> ValkeyResult<Outcome<bool>> {
        finish(
            self.execute(
                "EXPIRE",
                vec![copy_arg(key), uint_arg(ttl.as_secs())],
                Conv::IntBool,
            )
            .await?,
        )
    }

    /// Set a key's time to live in milliseconds
    pub async fn pexpire(&mut self, key: &[u8], ttl: Duration) -> ValkeyResult<Outcome<bool>> {
        finish(
            self.execute(
                "PEXPIRE",
                vec![copy_arg(key), uint_arg(ttl.as_millis() as u64)],
                Conv::IntBool,
            )
            .await?,
        )
    }

    /// Remaining time to live in seconds; -1 without expiry, -2 when absent
    pub async fn ttl(&mut self, key: &[u8]) -> ValkeyResult<Outcome<i64>> {
        finish(self.execute("TTL", vec![copy_arg(key)], Conv::Int).await?)
    }

    /// Remaining time to live in milliseconds
    pub async fn pttl(&mut self, key: &[u8]) -> ValkeyResult<Outcome<i64>> {
        finish(self.execute("PTTL", vec![copy_arg(key)], Conv::Int).await?)
    }

    /// Clear a key's expiry
    pub async fn persist(&mut self, key: &[u8]) -> ValkeyResult<Outcome<bool>> {
        finish(self.execute("PERSIST", vec![copy_arg(key)], Conv::IntBool).await?)
    }

    /// Type of the value stored at a key ("string", "hash", "none", ...)
    pub async fn type_of(&mut self, key: &[u8]) -> ValkeyResult<Outcome<String>> {
        finish(self.execute("TYPE", vec![copy_arg(key)], Conv::Status).await?)
    }

    /// Rename a key
    pub async fn rename(&mut self, key: &[u8], new_key: &[u8]) -> ValkeyResult<Outcome<bool>> {
        finish(
            self.execute("RENAME", vec![copy_arg(key), copy_arg(new_key)], Conv::OkBool)
                .await?,
        )
    }

    /// Rename a key only when the target does not exist
    pub async fn rename_nx(&mut self, key: &[u8], new_key: &[u8]) -> ValkeyResult<Outcome<bool>> {
        finish(
            self.execute(
                "RENAMENX",
                vec![copy_arg(key), copy_arg(new_key)],
                Conv::IntBool,
            )
            .await?,
        )
    }

    /// Update key access times, returning how many keys were touched
    pub async fn touch(&mut self, keys: &[&[u8]]) -> ValkeyResult<Outcome<i64>> {
        let args = keys.iter().map(|key| copy_arg(key)).collect();
        finish(self.execute("TOUCH", args, Conv::Int).await?)
    }

    /// All keys matching a glob pattern
    ///
    /// Prefer [`scan`](crate::scan) on large keyspaces.
    pub async fn keys(&mut self, pattern: &[u8]) -> ValkeyResult<Outcome<Vec<Bytes>>> {
        finish(self.execute("KEYS", vec![copy_arg(pattern)], Conv::BytesSeq).await?)
    }

    /// A random key from the keyspace
    pub async fn random_key(&mut self) -> ValkeyResult<Outcome<Option<Bytes>>> {
        finish(self.execute("RANDOMKEY", Vec::new(), Conv::OptionalBytes).await?)
    }
}
