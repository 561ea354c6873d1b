//! Sorted-set commands

use bytes::Bytes;
use valkey_bridge_core::{error::ValkeyResult, reply::Outcome};

use super::{float_arg, int_arg, static_arg};
use crate::adapter::UnifiedClient;
use crate::connection::{copy_arg, finish, Connection};
use crate::convert::Conv;

impl<A: UnifiedClient> Connection<A> {
    /// Add members with scores, returning how many were new
    pub async fn zadd(&mut self, key: &[u8], entries: &[(f64, &[u8])]) -> ValkeyResult<Outcome<i64>> {
        let mut args = vec![copy_arg(key)];
        for (score, member) in entries {
            args.push(float_arg(*score));
            args.push(copy_arg(member));
        }
        finish(self.execute("ZADD", args, Conv::Int).await?)
    }

    /// Remove members, returning how many were removed
    pub async fn zrem(&mut self, key: &[u8], members: &[&[u8]]) -> ValkeyResult<Outcome<i64>> {
        let mut args = vec![copy_arg(key)];
        args.extend(members.iter().map(|member| copy_arg(member)));
        finish(self.execute("ZREM", args, Conv::Int).await?)
    }

    /// Score of a member
    pub async fn zscore(&mut self, key: &[u8], member: &[u8]) -> ValkeyResult<Outcome<Option<f64>>> {
        finish(
            self.execute(
                "ZSCORE",
                vec![copy_arg(key), copy_arg(member)],
                Conv::OptionalDouble,
            )
            .await?,
        )
    }

    /// Number of members
    pub async fn zcard(&mut self, key: &[u8]) -> ValkeyResult<Outcome<i64>> {
        finish(self.execute("ZCARD", vec![copy_arg(key)], Conv::Int).await?)
    }

    /// Rank of a member in ascending score order
    pub async fn zrank(&mut self, key: &[u8], member: &[u8]) -> ValkeyResult<Outcome<Option<i64>>> {
        finish(
            self.execute(
                "ZRANK",
                vec![copy_arg(key), copy_arg(member)],
                Conv::OptionalInt,
            )
            .await?,
        )
    }

    /// Rank of a member in descending score order
    pub async fn zrevrank(&mut self, key: &[u8], member: &[u8]) -> ValkeyResult<Outcome<Option<i64>>> {
        finish(
            self.execute(
                "ZREVRANK",
                vec![copy_arg(key), copy_arg(member)],
                Conv::OptionalInt,
            )
            .await?,
        )
    }

    /// Members in an inclusive index range, ascending by score
    pub async fn zrange(&mut self, key: &[u8], start: i64, stop: i64) -> ValkeyResult<Outcome<Vec<Bytes>>> {
        finish(
            self.execute(
                "ZRANGE",
                vec![copy_arg(key), int_arg(start), int_arg(stop)],
                Conv::BytesSeq,
            )
            .await?,
        )
    }

    /// Members with their scores in an inclusive index range
    pub async fn zrange_with_scores(
        &mut self,
        key: &[u8],
        start: i64,
        stop: i64,
    ) -> ValkeyResult<Outcome<Vec<(Bytes, f64)>>> {
        finish(
            self.execute(
                "ZRANGE",
                vec![
                    copy_arg(key),
                    int_arg(start),
                    int_arg(stop),
                    static_arg("WITHSCORES"),
                ],
                Conv::ScoredMap,
            )
            .await?,
        )
    }

    /// Increment a member's score, returning the new score
    pub async fn zincr_by(
        &mut self,
        key: &[u8],
        increment: f64,
        member: &[u8],
    ) -> ValkeyResult<Outcome<f64>> {
        finish(
            self.execute(
                "ZINCRBY",
                vec![copy_arg(key), float_arg(increment), copy_arg(member)],
                Conv::Double,
            )
            .await?,
        )
    }

    /// Count members with scores inside an inclusive range
    pub async fn zcount(&mut self, key: &[u8], min: f64, max: f64) -> ValkeyResult<Outcome<i64>> {
        finish(
            self.execute(
                "ZCOUNT",
                vec![copy_arg(key), float_arg(min), float_arg(max)],
                Conv::Int,
            )
            .await?,
        )
    }
}
