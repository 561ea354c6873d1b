//! Typed command groups
//!
//! Every store operation is exposed as a typed method on
//! [`Connection`](crate::connection::Connection), grouped by data type the
//! way the server documents them. Each method resolves to
//! [`Outcome::Done`](valkey_bridge_core::reply::Outcome) with the converted
//! result in direct mode, or [`Outcome::Queued`] while a pipeline or
//! transaction is collecting.

pub mod hash;
pub mod key;
pub mod list;
pub mod scripting;
pub mod server;
pub mod set;
pub mod sorted_set;
pub mod stream;
pub mod string;

pub use string::{BitFieldArgs, BitFieldOverflow, BitFieldType, Expiration, SetCondition, SetOptions};

use bytes::Bytes;

pub(crate) fn int_arg(value: i64) -> Bytes {
    Bytes::from(value.to_string().into_bytes())
}

pub(crate) fn uint_arg(value: u64) -> Bytes {
    Bytes::from(value.to_string().into_bytes())
}

pub(crate) fn float_arg(value: f64) -> Bytes {
    Bytes::from(value.to_string().into_bytes())
}

pub(crate) fn static_arg(value: &'static str) -> Bytes {
    Bytes::from_static(value.as_bytes())
}
