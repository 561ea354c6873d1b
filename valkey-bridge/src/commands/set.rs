//! Set commands

use bytes::Bytes;
use valkey_bridge_core::{error::ValkeyResult, reply::Outcome};

use super::int_arg;
use crate::adapter::UnifiedClient;
use crate::connection::{copy_arg, finish, Connection};
use crate::convert::Conv;

impl<A: UnifiedClient> Connection<A> {
    /// Add members to a set, returning how many were new
    pub async fn sadd(&mut self, key: &[u8], members: &[&[u8]]) -> ValkeyResult<Outcome<i64>> {
        let mut args = vec![copy_arg(key)];
        args.extend(members.iter().map(|member| copy_arg(member)));
        finish(self.execute("SADD", args, Conv::Int).await?)
    }

    /// Remove members from a set, returning how many were removed
    pub async fn srem(&mut self, key: &[u8], members: &[&[u8]]) -> ValkeyResult<Outcome<i64>> {
        let mut args = vec![copy_arg(key)];
        args.extend(members.iter().map(|member| copy_arg(member)));
        finish(self.execute("SREM", args, Conv::Int).await?)
    }

    /// All members of a set
    pub async fn smembers(&mut self, key: &[u8]) -> ValkeyResult<Outcome<Vec<Bytes>>> {
        finish(self.execute("SMEMBERS", vec![copy_arg(key)], Conv::BytesSeq).await?)
    }

    /// Check set membership
    pub async fn sismember(&mut self, key: &[u8], member: &[u8]) -> ValkeyResult<Outcome<bool>> {
        finish(
            self.execute(
                "SISMEMBER",
                vec![copy_arg(key), copy_arg(member)],
                Conv::IntBool,
            )
            .await?,
        )
    }

    /// Number of members in a set
    pub async fn scard(&mut self, key: &[u8]) -> ValkeyResult<Outcome<i64>> {
        finish(self.execute("SCARD", vec![copy_arg(key)], Conv::Int).await?)
    }

    /// Remove and return a random member
    pub async fn spop(&mut self, key: &[u8]) -> ValkeyResult<Outcome<Option<Bytes>>> {
        finish(self.execute("SPOP", vec![copy_arg(key)], Conv::OptionalBytes).await?)
    }

    /// A random member without removing it
    pub async fn srandmember(&mut self, key: &[u8]) -> ValkeyResult<Outcome<Option<Bytes>>> {
        finish(
            self.execute("SRANDMEMBER", vec![copy_arg(key)], Conv::OptionalBytes)
                .await?,
        )
    }

    /// Random members without removing them; negative counts allow repeats
    pub async fn srandmember_count(
        &mut self,
        key: &[u8],
        count: i64,
    ) -> ValkeyResult<Outcome<Vec<Bytes>>> {
        finish(
            self.execute(
                "SRANDMEMBER",
                vec![copy_arg(key), int_arg(count)],
                Conv::BytesSeq,
            )
            .await?,
        )
    }

    /// Union of the given sets
    pub async fn sunion(&mut self, keys: &[&[u8]]) -> ValkeyResult<Outcome<Vec<Bytes>>> {
        let args = keys.iter().map(|key| copy_arg(key)).collect();
        finish(self.execute("SUNION", args, Conv::BytesSeq).await?)
    }

    /// Difference of the first set against the rest
    pub async fn sdiff(&mut self, keys: &[&[u8]]) -> ValkeyResult<Outcome<Vec<Bytes>>> {
        let args = keys.iter().map(|key| copy_arg(key)).collect();
        finish(self.execute("SDIFF", args, Conv::BytesSeq).await?)
    }
}
