//! Converted command results
//!
//! `Reply` is the closed set of result variants a converted command reply may
//! take. Typed command methods narrow a `Reply` further via `TryFrom`.
//! `Outcome` distinguishes an immediately executed command from one captured
//! into an open pipeline/transaction.

use crate::error::{ValkeyError, ValkeyResult};
use bytes::Bytes;

/// A converted command result
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Absent value
    Nil,
    /// Boolean result
    Bool(bool),
    /// Integer result
    Int(i64),
    /// Double result
    Double(f64),
    /// Binary string result
    Bytes(Bytes),
    /// Status string result (e.g. "OK", "PONG")
    Status(String),
    /// Ordered sequence of results
    Seq(Vec<Reply>),
    /// Mapping with binary keys, preserving server order
    Map(Vec<(Bytes, Reply)>),
}

impl Reply {
    /// Check if this is an absent value
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }
}

impl TryFrom<Reply> for bool {
    type Error = ValkeyError;

    fn try_from(reply: Reply) -> Result<Self, Self::Error> {
        match reply {
            Reply::Bool(b) => Ok(b),
            Reply::Int(0) => Ok(false),
            Reply::Int(1) => Ok(true),
            Reply::Status(s) if s == "OK" => Ok(true),
            Reply::Nil => Ok(false),
            other => Err(ValkeyError::Type(format!(
                "Cannot convert {other:?} to bool"
            ))),
        }
    }
}

impl TryFrom<Reply> for i64 {
    type Error = ValkeyError;

    fn try_from(reply: Reply) -> Result<Self, Self::Error> {
        match reply {
            Reply::Int(i) => Ok(i),
            other => Err(ValkeyError::Type(format!(
                "Cannot convert {other:?} to integer"
            ))),
        }
    }
}

impl TryFrom<Reply> for f64 {
    type Error = ValkeyError;

    fn try_from(reply: Reply) -> Result<Self, Self::Error> {
        match reply {
            Reply::Double(d) => Ok(d),
            Reply::Int(i) => Ok(i as f64),
            other => Err(ValkeyError::Type(format!(
                "Cannot convert {other:?} to double"
            ))),
        }
    }
}

impl TryFrom<Reply> for String {
    type Error = ValkeyError;

    fn try_from(reply: Reply) -> Result<Self, Self::Error> {
        match reply {
            Reply::Status(s) => Ok(s),
            Reply::Bytes(b) => String::from_utf8(b.to_vec())
                .map_err(|e| ValkeyError::Type(format!("Invalid UTF-8: {e}"))),
            other => Err(ValkeyError::Type(format!(
                "Cannot convert {other:?} to string"
            ))),
        }
    }
}

impl TryFrom<Reply> for Bytes {
    type Error = ValkeyError;

    fn try_from(reply: Reply) -> Result<Self, Self::Error> {
        match reply {
            Reply::Bytes(b) => Ok(b),
            Reply::Status(s) => Ok(Bytes::from(s.into_bytes())),
            other => Err(ValkeyError::Type(format!(
                "Cannot convert {other:?} to bytes"
            ))),
        }
    }
}

impl TryFrom<Reply> for Option<Bytes> {
    type Error = ValkeyError;

    fn try_from(reply: Reply) -> Result<Self, Self::Error> {
        match reply {
            Reply::Nil => Ok(None),
            other => Bytes::try_from(other).map(Some),
        }
    }
}

impl TryFrom<Reply> for Option<i64> {
    type Error = ValkeyError;

    fn try_from(reply: Reply) -> Result<Self, Self::Error> {
        match reply {
            Reply::Nil => Ok(None),
            other => i64::try_from(other).map(Some),
        }
    }
}

impl TryFrom<Reply> for Option<f64> {
    type Error = ValkeyError;

    fn try_from(reply: Reply) -> Result<Self, Self::Error> {
        match reply {
            Reply::Nil => Ok(None),
            other => f64::try_from(other).map(Some),
        }
    }
}

impl TryFrom<Reply> for Vec<Bytes> {
    type Error = ValkeyError;

    fn try_from(reply: Reply) -> Result<Self, Self::Error> {
        match reply {
            Reply::Seq(items) => items.into_iter().map(Bytes::try_from).collect(),
            Reply::Nil => Ok(Vec::new()),
            other => Err(ValkeyError::Type(format!(
                "Cannot convert {other:?} to byte sequence"
            ))),
        }
    }
}

impl TryFrom<Reply> for Vec<Option<Bytes>> {
    type Error = ValkeyError;

    fn try_from(reply: Reply) -> Result<Self, Self::Error> {
        match reply {
            Reply::Seq(items) => items.into_iter().map(Option::<Bytes>::try_from).collect(),
            other => Err(ValkeyError::Type(format!(
                "Cannot convert {other:?} to optional byte sequence"
            ))),
        }
    }
}

impl TryFrom<Reply> for Vec<Option<i64>> {
    type Error = ValkeyError;

    fn try_from(reply: Reply) -> Result<Self, Self::Error> {
        match reply {
            Reply::Seq(items) => items.into_iter().map(Option::<i64>::try_from).collect(),
            other => Err(ValkeyError::Type(format!(
                "Cannot convert {other:?} to optional integer sequence"
            ))),
        }
    }
}

impl TryFrom<Reply> for Vec<(Bytes, Bytes)> {
    type Error = ValkeyError;

    fn try_from(reply: Reply) -> Result<Self, Self::Error> {
        match reply {
            Reply::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| Ok((k, Bytes::try_from(v)?)))
                .collect(),
            Reply::Nil => Ok(Vec::new()),
            other => Err(ValkeyError::Type(format!(
                "Cannot convert {other:?} to byte mapping"
            ))),
        }
    }
}

impl TryFrom<Reply> for Vec<(Bytes, f64)> {
    type Error = ValkeyError;

    fn try_from(reply: Reply) -> Result<Self, Self::Error> {
        match reply {
            Reply::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| Ok((k, f64::try_from(v)?)))
                .collect(),
            Reply::Nil => Ok(Vec::new()),
            other => Err(ValkeyError::Type(format!(
                "Cannot convert {other:?} to scored mapping"
            ))),
        }
    }
}

/// Outcome of a command issued through a connection that may be queuing
///
/// While a pipeline or transaction is collecting, every command call is
/// captured into the batch and resolves to [`Outcome::Queued`]; the converted
/// value arrives positionally from `close_pipeline()`/`exec()` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The command executed immediately; this is its converted result
    Done(T),
    /// The command was captured into the active pipeline/transaction
    Queued,
}

impl<T> Outcome<T> {
    /// Unwrap the immediate result
    ///
    /// # Errors
    ///
    /// Returns a usage error if the command was queued.
    pub fn done(self) -> ValkeyResult<T> {
        match self {
            Self::Done(value) => Ok(value),
            Self::Queued => Err(ValkeyError::Usage(
                "Command was queued; result arrives from close_pipeline()/exec()".to_string(),
            )),
        }
    }

    /// Check whether the command was captured into a batch
    #[must_use]
    pub const fn is_queued(&self) -> bool {
        matches!(self, Self::Queued)
    }
}
