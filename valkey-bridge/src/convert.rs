//! Result converters
//!
//! Every command carries a converter describing how its raw reply becomes
//! the documented result shape. In direct mode the converter runs
//! immediately; in pipeline/transaction mode it is recorded alongside the
//! queued command and applied positionally when the batch is flushed.
//! Converters are a small closed catalog rather than arbitrary closures so
//! a queued batch stays inspectable and the queue entry stays
//! `(command, arguments, converter)`.

use bytes::Bytes;
use valkey_bridge_core::{
    error::{ValkeyError, ValkeyResult},
    reply::Reply,
    value::Value,
};

/// Converter applied to a command's raw reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conv {
    /// Structural normalization without a command-specific shape
    Raw,
    /// Status string (e.g. "OK", "PONG")
    Status,
    /// "OK" status (or nil for aborted conditional writes) as a boolean
    OkBool,
    /// Integer
    Int,
    /// Integer, nil allowed
    OptionalInt,
    /// 0/1 integer (or boolean reply) as a boolean
    IntBool,
    /// Double, possibly reported as a bulk string
    Double,
    /// Double, nil allowed
    OptionalDouble,
    /// Binary string, nil allowed
    OptionalBytes,
    /// Sequence of binary strings, nil elements preserved
    BytesSeq,
    /// Flat key/value mapping with binary keys
    BytesMap,
    /// Member/score mapping (range-with-scores shapes)
    ScoredMap,
}

impl Conv {
    /// Apply this converter to a raw reply
    ///
    /// # Errors
    ///
    /// Returns a server error for error replies and a type error when the
    /// reply does not fit the expected shape.
    pub fn apply(self, value: Value) -> ValkeyResult<Reply> {
        let value = match value {
            Value::Error(msg) => return Err(ValkeyError::Server(msg)),
            other => other,
        };

        match self {
            Self::Raw => raw_reply(value),
            Self::Status => Ok(Reply::Status(value.as_string()?)),
            Self::OkBool => match value {
                Value::Nil => Ok(Reply::Bool(false)),
                Value::Bool(b) => Ok(Reply::Bool(b)),
                other => Ok(Reply::Bool(other.as_string()? == "OK")),
            },
            Self::Int => Ok(Reply::Int(value.as_int()?)),
            Self::OptionalInt => match value {
                Value::Nil => Ok(Reply::Nil),
                other => Ok(Reply::Int(other.as_int()?)),
            },
            Self::IntBool => match value {
                Value::Bool(b) => Ok(Reply::Bool(b)),
                other => Ok(Reply::Bool(other.as_int()? != 0)),
            },
            Self::Double => Ok(Reply::Double(value.as_double()?)),
            Self::OptionalDouble => match value {
                Value::Nil => Ok(Reply::Nil),
                other => Ok(Reply::Double(other.as_double()?)),
            },
            Self::OptionalBytes => match value {
                Value::Nil => Ok(Reply::Nil),
                other => Ok(Reply::Bytes(other.as_bytes()?)),
            },
            Self::BytesSeq => match value {
                Value::Nil => Ok(Reply::Seq(Vec::new())),
                other => {
                    let items = other.into_array()?;
                    let converted = items
                        .into_iter()
                        .map(|item| match item {
                            Value::Nil => Ok(Reply::Nil),
                            other => Ok(Reply::Bytes(other.as_bytes()?)),
                        })
                        .collect::<ValkeyResult<Vec<_>>>()?;
                    Ok(Reply::Seq(converted))
                }
            },
            Self::BytesMap => {
                let entries = value.into_map()?;
                let converted = entries
                    .into_iter()
                    .map(|(k, v)| Ok((k.as_bytes()?, Reply::Bytes(v.as_bytes()?))))
                    .collect::<ValkeyResult<Vec<_>>>()?;
                Ok(Reply::Map(converted))
            }
            Self::ScoredMap => {
                let entries = scored_entries(value)?;
                let converted = entries
                    .into_iter()
                    .map(|(member, score)| Ok((member.as_bytes()?, Reply::Double(score.as_double()?))))
                    .collect::<ValkeyResult<Vec<_>>>()?;
                Ok(Reply::Map(converted))
            }
        }
    }
}

/// Structural reply normalization: keep the shape, translate the variants
fn raw_reply(value: Value) -> ValkeyResult<Reply> {
    Ok(match value {
        Value::Nil => Reply::Nil,
        Value::Simple(s) => Reply::Status(s),
        Value::Error(msg) => return Err(ValkeyError::Server(msg)),
        Value::Int(i) => Reply::Int(i),
        Value::Double(d) => Reply::Double(d),
        Value::Bool(b) => Reply::Bool(b),
        Value::Bytes(b) => Reply::Bytes(b),
        Value::Array(items) => Reply::Seq(
            items
                .into_iter()
                .map(raw_reply)
                .collect::<ValkeyResult<Vec<_>>>()?,
        ),
        Value::Map(entries) => Reply::Map(
            entries
                .into_iter()
                .map(|(k, v)| Ok((k.as_bytes()?, raw_reply(v)?)))
                .collect::<ValkeyResult<Vec<_>>>()?,
        ),
    })
}

/// Member/score pairs from either a RESP3 map or a RESP2 flat or paired array
fn scored_entries(value: Value) -> ValkeyResult<Vec<(Value, Value)>> {
    match value {
        Value::Map(entries) => Ok(entries),
        Value::Array(items) => {
            // Paired form: [[member, score], ...]
            if items.iter().all(|item| matches!(item, Value::Array(pair) if pair.len() == 2)) {
                return items
                    .into_iter()
                    .map(|item| {
                        let mut pair = item.into_array()?.into_iter();
                        match (pair.next(), pair.next()) {
                            (Some(member), Some(score)) => Ok((member, score)),
                            _ => Err(ValkeyError::Type("Malformed member/score pair".to_string())),
                        }
                    })
                    .collect();
            }
            Value::Array(items).into_map()
        }
        Value::Nil => Ok(Vec::new()),
        other => Err(ValkeyError::Type(format!(
            "Cannot read member/score pairs from {other:?}"
        ))),
    }
}

/// Parse an `INFO` reply into ordered key/value properties
///
/// Comment lines and blank lines are skipped.
#[must_use]
pub fn parse_info_properties(text: &str) -> Vec<(String, String)> {
    let mut properties = Vec::new();

    for line in text.split(['\r', '\n']) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            if !key.is_empty() {
                properties.push((key.trim().to_string(), value.trim().to_string()));
            }
        }
    }

    properties
}

/// Merge per-node `INFO` replies into one property list, each key prefixed
/// with the reporting node's address as `"<node>.<property>"`
///
/// # Errors
///
/// Returns a type error when a node's reply is not textual.
pub fn aggregate_info(entries: Vec<(Bytes, Reply)>) -> ValkeyResult<Vec<(String, String)>> {
    let mut aggregated = Vec::new();

    for (node, reply) in entries {
        let node = String::from_utf8_lossy(&node).into_owned();
        let text = String::try_from(reply)?;
        for (key, value) in parse_info_properties(&text) {
            aggregated.push((format!("{node}.{key}"), value));
        }
    }

    Ok(aggregated)
}

/// Merge per-node `CONFIG GET` replies into one property list, each key
/// prefixed with the reporting node's address
///
/// # Errors
///
/// Returns a type error when a node's reply is not a parameter map.
pub fn aggregate_config(entries: Vec<(Bytes, Reply)>) -> ValkeyResult<Vec<(String, String)>> {
    let mut aggregated = Vec::new();

    for (node, reply) in entries {
        let node = String::from_utf8_lossy(&node).into_owned();
        let params = parameter_pairs(reply)?;
        for (key, value) in params {
            aggregated.push((
                format!("{node}.{}", String::from_utf8_lossy(&key)),
                String::from_utf8_lossy(&value).into_owned(),
            ));
        }
    }

    Ok(aggregated)
}

/// Parameter pairs from either a map-shaped or a flat pairwise reply
fn parameter_pairs(reply: Reply) -> ValkeyResult<Vec<(Bytes, Bytes)>> {
    match reply {
        Reply::Map(_) | Reply::Nil => reply.try_into(),
        Reply::Seq(items) => {
            if items.len() % 2 != 0 {
                return Err(ValkeyError::Type(
                    "Parameter reply with odd element count".to_string(),
                ));
            }
            let mut pairs = Vec::with_capacity(items.len() / 2);
            let mut iter = items.into_iter();
            while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
                pairs.push((Bytes::try_from(key)?, Bytes::try_from(value)?));
            }
            Ok(pairs)
        }
        other => Err(ValkeyError::Type(format!(
            "Cannot read parameters from {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_bool() {
        assert_eq!(
            Conv::OkBool.apply(Value::Simple("OK".into())).unwrap(),
            Reply::Bool(true)
        );
        assert_eq!(Conv::OkBool.apply(Value::Nil).unwrap(), Reply::Bool(false));
    }

    #[test]
    fn test_int_bool() {
        assert_eq!(Conv::IntBool.apply(Value::Int(1)).unwrap(), Reply::Bool(true));
        assert_eq!(Conv::IntBool.apply(Value::Int(0)).unwrap(), Reply::Bool(false));
        assert_eq!(
            Conv::IntBool.apply(Value::Bool(true)).unwrap(),
            Reply::Bool(true)
        );
    }

    #[test]
    fn test_error_reply_becomes_server_error() {
        let err = Conv::Int.apply(Value::Error("WRONGTYPE".into())).unwrap_err();
        assert!(matches!(err, ValkeyError::Server(_)));
    }

    #[test]
    fn test_bytes_seq_preserves_holes() {
        let value = Value::Array(vec![Value::from("a"), Value::Nil, Value::from("c")]);
        let reply = Conv::BytesSeq.apply(value).unwrap();
        assert_eq!(
            reply,
            Reply::Seq(vec![
                Reply::Bytes(Bytes::from_static(b"a")),
                Reply::Nil,
                Reply::Bytes(Bytes::from_static(b"c")),
            ])
        );
    }

    #[test]
    fn test_bytes_map_accepts_pairwise_array() {
        let value = Value::Array(vec![
            Value::from("f1"),
            Value::from("v1"),
            Value::from("f2"),
            Value::from("v2"),
        ]);
        let reply = Conv::BytesMap.apply(value).unwrap();
        match reply {
            Reply::Map(entries) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].0, Bytes::from_static(b"f1"));
            }
            other => panic!("expected map, got {other:?}"),
        }
    }

    #[test]
    fn test_scored_map_shapes() {
        // RESP2 flat pairs
        let flat = Value::Array(vec![
            Value::from("m1"),
            Value::from("1.5"),
            Value::from("m2"),
            Value::from("2.5"),
        ]);
        let reply = Conv::ScoredMap.apply(flat).unwrap();
        assert_eq!(
            reply,
            Reply::Map(vec![
                (Bytes::from_static(b"m1"), Reply::Double(1.5)),
                (Bytes::from_static(b"m2"), Reply::Double(2.5)),
            ])
        );

        // Paired arrays
        let paired = Value::Array(vec![
            Value::Array(vec![Value::from("m1"), Value::Double(1.5)]),
            Value::Array(vec![Value::from("m2"), Value::Double(2.5)]),
        ]);
        assert_eq!(Conv::ScoredMap.apply(paired).unwrap(), reply);
    }

    #[test]
    fn test_parse_info_properties() {
        let text = "# Server\r\nredis_version:8.0.0\r\nuptime_in_seconds:42\r\n\r\n";
        let props = parse_info_properties(text);
        assert_eq!(
            props,
            vec![
                ("redis_version".to_string(), "8.0.0".to_string()),
                ("uptime_in_seconds".to_string(), "42".to_string()),
            ]
        );
    }

    #[test]
    fn test_aggregate_info_prefixes_node() {
        let entries = vec![
            (
                Bytes::from_static(b"10.0.0.1:7000"),
                Reply::Bytes(Bytes::from_static(b"role:master\r\n")),
            ),
            (
                Bytes::from_static(b"10.0.0.2:7000"),
                Reply::Bytes(Bytes::from_static(b"role:master\r\n")),
            ),
        ];
        let props = aggregate_info(entries).unwrap();
        assert_eq!(props[0].0, "10.0.0.1:7000.role");
        assert_eq!(props[1].0, "10.0.0.2:7000.role");
    }

    #[test]
    fn test_raw_normalizes_nested() {
        let value = Value::Array(vec![
            Value::Int(1),
            Value::Map(vec![(Value::from("k"), Value::Int(2))]),
        ]);
        let reply = Conv::Raw.apply(value).unwrap();
        assert_eq!(
            reply,
            Reply::Seq(vec![
                Reply::Int(1),
                Reply::Map(vec![(Bytes::from_static(b"k"), Reply::Int(2))]),
            ])
        );
    }
}
