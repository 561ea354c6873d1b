//! Hash commands

use bytes::Bytes;
use valkey_bridge_core::{error::ValkeyResult, reply::Outcome};

use super::int_arg;
use crate::adapter::UnifiedClient;
use crate::connection::{copy_arg, finish, Connection};
use crate::convert::Conv;

impl<A: UnifiedClient> Connection<A> {
    /// Set a hash field, returning whether it was newly created
    pub async fn hset(&mut self, key: &[u8], field: &[u8], value: &[u8]) -> ValkeyResult<Outcome<bool>> {
        finish(
            self.execute(
                "HSET",
                vec![copy_arg(key), copy_arg(field), copy_arg(value)],
                Conv::IntBool,
            )
            .await?,
        )
    }

    /// Set multiple hash fields, returning how many were newly created
    pub async fn hset_multiple(
        &mut self,
        key: &[u8],
        fields: &[(&[u8], &[u8])],
    ) -> ValkeyResult<Outcome<i64>> {
        let mut args = vec![copy_arg(key)];
        for (field, value) in fields {
            args.push(copy_arg(field));
            args.push(copy_arg(value));
        }
        finish(self.execute("HSET", args, Conv::Int).await?)
    }

    /// Get a hash field
    pub async fn hget(&mut self, key: &[u8], field: &[u8]) -> ValkeyResult<Outcome<Option<Bytes>>> {
        finish(
            self.execute("HGET", vec![copy_arg(key), copy_arg(field)], Conv::OptionalBytes)
                .await?,
        )
    }

    /// Get all fields and values of a hash, in server order
    pub async fn hgetall(&mut self, key: &[u8]) -> ValkeyResult<Outcome<Vec<(Bytes, Bytes)>>> {
        finish(self.execute("HGETALL", vec![copy_arg(key)], Conv::BytesMap).await?)
    }

    /// Get multiple hash fields; absent fields yield `None`
    pub async fn hmget(
        &mut self,
        key: &[u8],
        fields: &[&[u8]],
    ) -> ValkeyResult<Outcome<Vec<Option<Bytes>>>> {
        let mut args = vec![copy_arg(key)];
        args.extend(fields.iter().map(|field| copy_arg(field)));
        finish(self.execute("HMGET", args, Conv::BytesSeq).await?)
    }

    /// Delete hash fields, returning how many existed
    pub async fn hdel(&mut self, key: &[u8], fields: &[&[u8]]) -> ValkeyResult<Outcome<i64>> {
        let mut args = vec![copy_arg(key)];
        args.extend(fields.iter().map(|field| copy_arg(field)));
        finish(self.execute("HDEL", args, Conv::Int).await?)
    }

    /// Number of fields in a hash
    pub async fn hlen(&mut self, key: &[u8]) -> ValkeyResult<Outcome<i64>> {
        finish(self.execute("HLEN", vec![copy_arg(key)], Conv::Int).await?)
    }

    /// Check whether a hash field exists
    pub async fn hexists(&mut self, key: &[u8], field: &[u8]) -> ValkeyResult<Outcome<bool>> {
        finish(
            self.execute("HEXISTS", vec![copy_arg(key), copy_arg(field)], Conv::IntBool)
                .await?,
        )
    }

    /// All field names of a hash
    pub async fn hkeys(&mut self, key: &[u8]) -> ValkeyResult<Outcome<Vec<Bytes>>> {
        finish(self.execute("HKEYS", vec![copy_arg(key)], Conv::BytesSeq).await?)
    }

    /// All values of a hash
    pub async fn hvals(&mut self, key: &[u8]) -> ValkeyResult<Outcome<Vec<Bytes>>> {
        finish(self.execute("HVALS", vec![copy_arg(key)], Conv::BytesSeq).await?)
    }

    /// Increment a hash field's integer value
    pub async fn hincr_by(
        &mut self,
        key: &[u8],
        field: &[u8],
        increment: i64,
    ) -> ValkeyResult<Outcome<i64>> {
        finish(
            self.execute(
                "HINCRBY",
                vec![copy_arg(key), copy_arg(field), int_arg(increment)],
                Conv::Int,
            )
            .await?,
        )
    }
}
