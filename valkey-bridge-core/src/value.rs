//! Raw reply value types produced by the native drivers
//!
//! `Value` is the closed set of wire-level reply shapes. Drivers normalize
//! every native reply into one of these variants at the adapter boundary;
//! nothing driver-specific travels further up.

use crate::error::{ValkeyError, ValkeyResult};
use bytes::Bytes;

/// A raw reply from the store, normalized into a closed variant set
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value / null reply
    Nil,
    /// Simple (status) string: +OK\r\n
    Simple(String),
    /// Error reply captured inline (batch positions only)
    Error(String),
    /// Integer reply
    Int(i64),
    /// Double reply (RESP3)
    Double(f64),
    /// Boolean reply (RESP3)
    Bool(bool),
    /// Bulk string reply
    Bytes(Bytes),
    /// Array reply
    Array(Vec<Value>),
    /// Map reply (RESP3); association list preserving server order
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Convert to a string if possible
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as a string.
    pub fn as_string(&self) -> ValkeyResult<String> {
        match self {
            Self::Simple(s) => Ok(s.clone()),
            Self::Bytes(b) => String::from_utf8(b.to_vec())
                .map_err(|e| ValkeyError::Type(format!("Invalid UTF-8: {e}"))),
            Self::Nil => Err(ValkeyError::Type("Value is nil".to_string())),
            _ => Err(ValkeyError::Type(format!(
                "Cannot convert {self:?} to string"
            ))),
        }
    }

    /// Convert to an integer if possible
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as an integer.
    pub fn as_int(&self) -> ValkeyResult<i64> {
        match self {
            Self::Int(i) => Ok(*i),
            Self::Bytes(b) => {
                let s = String::from_utf8(b.to_vec())
                    .map_err(|e| ValkeyError::Type(format!("Invalid UTF-8: {e}")))?;
                s.parse::<i64>()
                    .map_err(|e| ValkeyError::Type(format!("Cannot parse integer: {e}")))
            }
            _ => Err(ValkeyError::Type(format!(
                "Cannot convert {self:?} to integer"
            ))),
        }
    }

    /// Convert to a double if possible
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as a double.
    pub fn as_double(&self) -> ValkeyResult<f64> {
        match self {
            Self::Double(d) => Ok(*d),
            Self::Int(i) => Ok(*i as f64),
            Self::Bytes(b) => {
                let s = String::from_utf8(b.to_vec())
                    .map_err(|e| ValkeyError::Type(format!("Invalid UTF-8: {e}")))?;
                s.parse::<f64>()
                    .map_err(|e| ValkeyError::Type(format!("Cannot parse double: {e}")))
            }
            _ => Err(ValkeyError::Type(format!(
                "Cannot convert {self:?} to double"
            ))),
        }
    }

    /// Convert to bytes if possible
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as bytes.
    pub fn as_bytes(&self) -> ValkeyResult<Bytes> {
        match self {
            Self::Bytes(b) => Ok(b.clone()),
            Self::Simple(s) => Ok(Bytes::from(s.as_bytes().to_vec())),
            Self::Nil => Err(ValkeyError::Type("Value is nil".to_string())),
            _ => Err(ValkeyError::Type(format!(
                "Cannot convert {self:?} to bytes"
            ))),
        }
    }

    /// Take the array elements, consuming the value
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an array.
    pub fn into_array(self) -> ValkeyResult<Vec<Self>> {
        match self {
            Self::Array(arr) => Ok(arr),
            _ => Err(ValkeyError::Type(format!(
                "Cannot convert {self:?} to array"
            ))),
        }
    }

    /// Take the map entries, consuming the value
    ///
    /// Flat arrays of alternating key/value elements are accepted as maps
    /// since RESP2 servers report map-shaped data that way.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is neither a map nor a pairwise array.
    pub fn into_map(self) -> ValkeyResult<Vec<(Self, Self)>> {
        match self {
            Self::Map(entries) => Ok(entries),
            Self::Array(items) => {
                if items.len() % 2 != 0 {
                    return Err(ValkeyError::Type(
                        "Array with odd element count is not a map".to_string(),
                    ));
                }
                let mut entries = Vec::with_capacity(items.len() / 2);
                let mut iter = items.into_iter();
                while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                    entries.push((k, v));
                }
                Ok(entries)
            }
            _ => Err(ValkeyError::Type(format!("Cannot convert {self:?} to map"))),
        }
    }

    /// Check if this is a nil value
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Check if this is an error reply
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Check if this value is structurally a map
    #[must_use]
    pub const fn is_map(&self) -> bool {
        matches!(self, Self::Map(_))
    }

    /// Extract the error message if this is an error reply
    #[must_use]
    pub fn into_error(self) -> Option<String> {
        match self {
            Self::Error(msg) => Some(msg),
            _ => None,
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Bytes(Bytes::from(s.into_bytes()))
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Bytes(Bytes::from(s.as_bytes().to_vec()))
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}
impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(b))
    }
}
impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Self::Bytes(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_string() {
        assert_eq!(Value::Simple("OK".into()).as_string().unwrap(), "OK");
        assert_eq!(Value::from("abc").as_string().unwrap(), "abc");
        assert!(Value::Nil.as_string().is_err());
    }

    #[test]
    fn test_as_int_from_bytes() {
        assert_eq!(Value::from("42").as_int().unwrap(), 42);
        assert_eq!(Value::Int(7).as_int().unwrap(), 7);
        assert!(Value::from("x").as_int().is_err());
    }

    #[test]
    fn test_pairwise_array_as_map() {
        let v = Value::Array(vec![
            Value::from("f1"),
            Value::from("v1"),
            Value::from("f2"),
            Value::from("v2"),
        ]);
        let entries = v.into_map().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, Value::from("f1"));

        let odd = Value::Array(vec![Value::from("f1")]);
        assert!(odd.into_map().is_err());
    }
}
