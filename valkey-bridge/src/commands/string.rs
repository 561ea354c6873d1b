//! String commands

use bytes::Bytes;
use valkey_bridge_core::{error::ValkeyResult, reply::Outcome};

use super::{float_arg, int_arg, static_arg, uint_arg};
use crate::adapter::UnifiedClient;
use crate::connection::{copy_arg, finish, Connection};
use crate::convert::Conv;

/// Expiration applied by a SET
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Expire after the given number of seconds
    Seconds(u64),
    /// Expire after the given number of milliseconds
    Millis(u64),
    /// Keep the key's existing time to live
    KeepTtl,
}

/// Existence condition applied by a SET
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCondition {
    /// Only set the key if it does not already exist
    NotExists,
    /// Only set the key if it already exists
    Exists,
}

/// Options for the SET command
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Expiration to apply
    pub expiration: Option<Expiration>,
    /// Existence condition to apply
    pub condition: Option<SetCondition>,
}

impl SetOptions {
    /// Set an expiration
    #[must_use]
    pub const fn expire(mut self, expiration: Expiration) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Set an existence condition
    #[must_use]
    pub const fn condition(mut self, condition: SetCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    fn append_to(self, args: &mut Vec<Bytes>) {
        match self.expiration {
            Some(Expiration::Seconds(secs)) => {
                args.push(static_arg("EX"));
                args.push(uint_arg(secs));
            }
            Some(Expiration::Millis(millis)) => {
                args.push(static_arg("PX"));
                args.push(uint_arg(millis));
            }
            Some(Expiration::KeepTtl) => args.push(static_arg("KEEPTTL")),
            None => {}
        }
        match self.condition {
            Some(SetCondition::NotExists) => args.push(static_arg("NX")),
            Some(SetCondition::Exists) => args.push(static_arg("XX")),
            None => {}
        }
    }
}

/// Field width of a BITFIELD subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitFieldType {
    signed: bool,
    bits: u8,
}

impl BitFieldType {
    /// Unsigned field of the given bit width
    #[must_use]
    pub const fn unsigned(bits: u8) -> Self {
        Self { signed: false, bits }
    }

    /// Signed field of the given bit width
    #[must_use]
    pub const fn signed(bits: u8) -> Self {
        Self { signed: true, bits }
    }

    fn spec(self) -> Bytes {
        let prefix = if self.signed { 'i' } else { 'u' };
        Bytes::from(format!("{prefix}{}", self.bits).into_bytes())
    }
}

/// Overflow control for BITFIELD INCRBY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitFieldOverflow {
    /// Wrap around on overflow
    Wrap,
    /// Saturate at the type's minimum/maximum
    Sat,
    /// Yield an absent result on overflow, leaving the field unchanged
    Fail,
}

impl BitFieldOverflow {
    const fn keyword(self) -> &'static str {
        match self {
            Self::Wrap => "WRAP",
            Self::Sat => "SAT",
            Self::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone)]
enum BitFieldOp {
    Overflow(BitFieldOverflow),
    Get(BitFieldType, u64),
    Set(BitFieldType, u64, i64),
    IncrBy(BitFieldType, u64, i64),
}

/// Subcommand sequence for BITFIELD
///
/// Subcommands run in order; an OVERFLOW directive applies to the INCRBY
/// subcommands after it.
#[derive(Debug, Clone, Default)]
pub struct BitFieldArgs {
    ops: Vec<BitFieldOp>,
}

impl BitFieldArgs {
    /// Create an empty subcommand sequence
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a field
    #[must_use]
    pub fn get(mut self, ty: BitFieldType, offset: u64) -> Self {
        self.ops.push(BitFieldOp::Get(ty, offset));
        self
    }

    /// Write a field, yielding the previous value
    #[must_use]
    pub fn set(mut self, ty: BitFieldType, offset: u64, value: i64) -> Self {
        self.ops.push(BitFieldOp::Set(ty, offset, value));
        self
    }

    /// Increment a field, yielding the new value
    #[must_use]
    pub fn incr_by(mut self, ty: BitFieldType, offset: u64, increment: i64) -> Self {
        self.ops.push(BitFieldOp::IncrBy(ty, offset, increment));
        self
    }

    /// Set the overflow policy for subsequent increments
    #[must_use]
    pub fn overflow(mut self, policy: BitFieldOverflow) -> Self {
        self.ops.push(BitFieldOp::Overflow(policy));
        self
    }

    /// Check whether any subcommands were added
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn append_to(self, args: &mut Vec<Bytes>) {
        for op in self.ops {
            match op {
                BitFieldOp::Overflow(policy) => {
                    args.push(static_arg("OVERFLOW"));
                    args.push(static_arg(policy.keyword()));
                }
                BitFieldOp::Get(ty, offset) => {
                    args.push(static_arg("GET"));
                    args.push(ty.spec());
                    args.push(uint_arg(offset));
                }
                BitFieldOp::Set(ty, offset, value) => {
                    args.push(static_arg("SET"));
                    args.push(ty.spec());
                    args.push(uint_arg(offset));
                    args.push(int_arg(value));
                }
                BitFieldOp::IncrBy(ty, offset, increment) => {
                    args.push(static_arg("INCRBY"));
                    args.push(ty.spec());
                    args.push(uint_arg(offset));
                    args.push(int_arg(increment));
                }
            }
        }
    }
}

impl<A: UnifiedClient> Connection<A> {
    /// Get the value of a key
    pub async fn get(&mut self, key: &[u8]) -> ValkeyResult<Outcome<Option<Bytes>>> {
        finish(
            self.execute("GET", vec![copy_arg(key)], Conv::OptionalBytes)
                .await?,
        )
    }

    /// Set a key to a value
    pub async fn set(&mut self, key: &[u8], value: &[u8]) -> ValkeyResult<Outcome<bool>> {
        finish(
            self.execute("SET", vec![copy_arg(key), copy_arg(value)], Conv::OkBool)
                .await?,
        )
    }

    /// Set a key to a value with expiration/condition options
    ///
    /// Yields `false` when a condition prevented the write.
    pub async fn set_with_options(
        &mut self,
        key: &[u8],
        value: &[u8],
        options: SetOptions,
    ) -> ValkeyResult<Outcome<bool>> {
        let mut args = vec![copy_arg(key), copy_arg(value)];
        options.append_to(&mut args);
        finish(self.execute("SET", args, Conv::OkBool).await?)
    }

    /// Set a key only if it does not exist
    pub async fn set_nx(&mut self, key: &[u8], value: &[u8]) -> ValkeyResult<Outcome<bool>> {
        finish(
            self.execute("SETNX", vec![copy_arg(key), copy_arg(value)], Conv::IntBool)
                .await?,
        )
    }

    /// Set a key and return its previous value
    pub async fn get_set(&mut self, key: &[u8], value: &[u8]) -> ValkeyResult<Outcome<Option<Bytes>>> {
        finish(
            self.execute(
                "GETSET",
                vec![copy_arg(key), copy_arg(value)],
                Conv::OptionalBytes,
            )
            .await?,
        )
    }

    /// Get the value of a key and delete it
    pub async fn get_del(&mut self, key: &[u8]) -> ValkeyResult<Outcome<Option<Bytes>>> {
        finish(
            self.execute("GETDEL", vec![copy_arg(key)], Conv::OptionalBytes)
                .await?,
        )
    }

    /// Get the values of multiple keys; absent keys yield `None`
    pub async fn mget(&mut self, keys: &[&[u8]]) -> ValkeyResult<Outcome<Vec<Option<Bytes>>>> {
        let args = keys.iter().map(|key| copy_arg(key)).collect();
        finish(self.execute("MGET", args, Conv::BytesSeq).await?)
    }

    /// Set multiple keys in one call
    pub async fn mset(&mut self, pairs: &[(&[u8], &[u8])]) -> ValkeyResult<Outcome<bool>> {
        let mut args = Vec::with_capacity(pairs.len() * 2);
        for (key, value) in pairs {
            args.push(copy_arg(key));
            args.push(copy_arg(value));
        }
        finish(self.execute("MSET", args, Conv::OkBool).await?)
    }

    /// Increment a key's integer value by one
    pub async fn incr(&mut self, key: &[u8]) -> ValkeyResult<Outcome<i64>> {
        finish(self.execute("INCR", vec![copy_arg(key)], Conv::Int).await?)
    }

    /// Increment a key's integer value
    pub async fn incr_by(&mut self, key: &[u8], increment: i64) -> ValkeyResult<Outcome<i64>> {
        finish(
            self.execute("INCRBY", vec![copy_arg(key), int_arg(increment)], Conv::Int)
                .await?,
        )
    }

    /// Increment a key's float value
    pub async fn incr_by_float(&mut self, key: &[u8], increment: f64) -> ValkeyResult<Outcome<f64>> {
        finish(
            self.execute(
                "INCRBYFLOAT",
                vec![copy_arg(key), float_arg(increment)],
                Conv::Double,
            )
            .await?,
        )
    }

    /// Decrement a key's integer value by one
    pub async fn decr(&mut self, key: &[u8]) -> ValkeyResult<Outcome<i64>> {
        finish(self.execute("DECR", vec![copy_arg(key)], Conv::Int).await?)
    }

    /// Decrement a key's integer value
    pub async fn decr_by(&mut self, key: &[u8], decrement: i64) -> ValkeyResult<Outcome<i64>> {
        finish(
            self.execute("DECRBY", vec![copy_arg(key), int_arg(decrement)], Conv::Int)
                .await?,
        )
    }

    /// Append to a key's value, returning the new length
    pub async fn append(&mut self, key: &[u8], value: &[u8]) -> ValkeyResult<Outcome<i64>> {
        finish(
            self.execute("APPEND", vec![copy_arg(key), copy_arg(value)], Conv::Int)
                .await?,
        )
    }

    /// Length of a key's value
    pub async fn str_len(&mut self, key: &[u8]) -> ValkeyResult<Outcome<i64>> {
        finish(self.execute("STRLEN", vec![copy_arg(key)], Conv::Int).await?)
    }

    /// Substring of a key's value by inclusive byte range
    pub async fn get_range(&mut self, key: &[u8], start: i64, end: i64) -> ValkeyResult<Outcome<Bytes>> {
        finish(
            self.execute(
                "GETRANGE",
                vec![copy_arg(key), int_arg(start), int_arg(end)],
                Conv::OptionalBytes,
            )
            .await?,
        )
    }

    /// Overwrite part of a key's value, returning the new length
    pub async fn set_range(&mut self, key: &[u8], offset: u64, value: &[u8]) -> ValkeyResult<Outcome<i64>> {
        finish(
            self.execute(
                "SETRANGE",
                vec![copy_arg(key), uint_arg(offset), copy_arg(value)],
                Conv::Int,
            )
            .await?,
        )
    }

    /// Get the bit at an offset
    pub async fn get_bit(&mut self, key: &[u8], offset: u64) -> ValkeyResult<Outcome<bool>> {
        finish(
            self.execute("GETBIT", vec![copy_arg(key), uint_arg(offset)], Conv::IntBool)
                .await?,
        )
    }

    /// Set the bit at an offset, returning the previous bit
    pub async fn set_bit(&mut self, key: &[u8], offset: u64, value: bool) -> ValkeyResult<Outcome<bool>> {
        finish(
            self.execute(
                "SETBIT",
                vec![copy_arg(key), uint_arg(offset), int_arg(i64::from(value))],
                Conv::IntBool,
            )
            .await?,
        )
    }

    /// Count the set bits of a key's value
    pub async fn bit_count(&mut self, key: &[u8]) -> ValkeyResult<Outcome<i64>> {
        finish(self.execute("BITCOUNT", vec![copy_arg(key)], Conv::Int).await?)
    }

    /// Run a BITFIELD subcommand sequence
    ///
    /// One result per GET/SET/INCRBY subcommand, in order; an increment
    /// under the FAIL overflow policy yields `None` when it would
    /// overflow.
    pub async fn bit_field(
        &mut self,
        key: &[u8],
        subcommands: BitFieldArgs,
    ) -> ValkeyResult<Outcome<Vec<Option<i64>>>> {
        let mut args = vec![copy_arg(key)];
        subcommands.append_to(&mut args);
        finish(self.execute("BITFIELD", args, Conv::Raw).await?)
    }
}
