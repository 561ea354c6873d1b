//! RESP protocol implementation
//!
//! Implements the serialization protocol spoken by Valkey servers for
//! encoding command frames and decoding replies. Both RESP2 and the RESP3
//! reply types negotiated via `HELLO 3` (maps, doubles, booleans, nulls,
//! sets, verbatim strings) are decoded into [`Value`].

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;
use valkey_bridge_core::{
    error::{ValkeyError, ValkeyResult},
    value::Value,
};

const CRLF: &[u8] = b"\r\n";

/// Encodes command frames
pub struct RespEncoder;

impl RespEncoder {
    /// Encode a full command (name plus arguments) as a RESP array of bulk
    /// strings, the only frame shape servers accept for requests
    pub fn encode_command(args: &[Bytes]) -> Bytes {
        let mut buf = BytesMut::new();

        buf.put_u8(b'*');
        buf.put_slice(args.len().to_string().as_bytes());
        buf.put_slice(CRLF);

        for arg in args {
            buf.put_u8(b'$');
            buf.put_slice(arg.len().to_string().as_bytes());
            buf.put_slice(CRLF);
            buf.put_slice(arg);
            buf.put_slice(CRLF);
        }

        buf.freeze()
    }
}

/// Decodes reply values from bytes
pub struct RespDecoder;

impl RespDecoder {
    /// Decode one reply from a buffer
    ///
    /// Returns `Ok(None)` when the buffer does not yet hold a complete
    /// reply; the cursor position is only meaningful on `Ok(Some(_))`.
    ///
    /// # Errors
    ///
    /// Returns a protocol error for malformed frames.
    pub fn decode(buf: &mut Cursor<&[u8]>) -> ValkeyResult<Option<Value>> {
        if !buf.has_remaining() {
            return Ok(None);
        }

        let type_byte = buf.chunk()[0];

        match type_byte {
            b'+' => Self::decode_simple(buf),
            b'-' => Self::decode_error(buf),
            b':' => Self::decode_integer(buf),
            b'$' => Self::decode_bulk(buf),
            b'*' | b'~' => Self::decode_array(buf),
            b'%' => Self::decode_map(buf),
            b',' => Self::decode_double(buf),
            b'#' => Self::decode_bool(buf),
            b'_' => Self::decode_null(buf),
            b'=' => Self::decode_verbatim(buf),
            _ => Err(ValkeyError::Protocol(format!(
                "Invalid RESP type byte: {}",
                type_byte as char
            ))),
        }
    }

    fn decode_simple(buf: &mut Cursor<&[u8]>) -> ValkeyResult<Option<Value>> {
        buf.advance(1);
        match Self::read_line(buf)? {
            Some(line) => Ok(Some(Value::Simple(Self::line_to_string(line)?))),
            None => Ok(None),
        }
    }

    fn decode_error(buf: &mut Cursor<&[u8]>) -> ValkeyResult<Option<Value>> {
        buf.advance(1);
        match Self::read_line(buf)? {
            Some(line) => Ok(Some(Value::Error(Self::line_to_string(line)?))),
            None => Ok(None),
        }
    }

    fn decode_integer(buf: &mut Cursor<&[u8]>) -> ValkeyResult<Option<Value>> {
        buf.advance(1);
        match Self::read_line(buf)? {
            Some(line) => {
                let num = Self::line_to_string(line)?
                    .parse::<i64>()
                    .map_err(|e| ValkeyError::Protocol(format!("Invalid integer: {e}")))?;
                Ok(Some(Value::Int(num)))
            }
            None => Ok(None),
        }
    }

    fn decode_double(buf: &mut Cursor<&[u8]>) -> ValkeyResult<Option<Value>> {
        buf.advance(1);
        match Self::read_line(buf)? {
            Some(line) => {
                let text = Self::line_to_string(line)?;
                let num = match text.as_str() {
                    "inf" => f64::INFINITY,
                    "-inf" => f64::NEG_INFINITY,
                    other => other
                        .parse::<f64>()
                        .map_err(|e| ValkeyError::Protocol(format!("Invalid double: {e}")))?,
                };
                Ok(Some(Value::Double(num)))
            }
            None => Ok(None),
        }
    }

    fn decode_bool(buf: &mut Cursor<&[u8]>) -> ValkeyResult<Option<Value>> {
        buf.advance(1);
        match Self::read_line(buf)? {
            Some(line) => match line.as_slice() {
                b"t" => Ok(Some(Value::Bool(true))),
                b"f" => Ok(Some(Value::Bool(false))),
                other => Err(ValkeyError::Protocol(format!(
                    "Invalid boolean payload: {other:?}"
                ))),
            },
            None => Ok(None),
        }
    }

    fn decode_null(buf: &mut Cursor<&[u8]>) -> ValkeyResult<Option<Value>> {
        buf.advance(1);
        match Self::read_line(buf)? {
            Some(_) => Ok(Some(Value::Nil)),
            None => Ok(None),
        }
    }

    fn decode_bulk(buf: &mut Cursor<&[u8]>) -> ValkeyResult<Option<Value>> {
        buf.advance(1);

        let len_line = match Self::read_line(buf)? {
            Some(line) => line,
            None => return Ok(None),
        };

        let len = Self::line_to_string(len_line)?
            .parse::<i64>()
            .map_err(|e| ValkeyError::Protocol(format!("Invalid bulk string length: {e}")))?;

        if len == -1 {
            return Ok(Some(Value::Nil));
        }

        let len = len as usize;
        if buf.remaining() < len + 2 {
            return Ok(None);
        }

        let data = buf.chunk()[..len].to_vec();
        buf.advance(len + 2); // payload + CRLF

        Ok(Some(Value::Bytes(Bytes::from(data))))
    }

    fn decode_verbatim(buf: &mut Cursor<&[u8]>) -> ValkeyResult<Option<Value>> {
        // Verbatim strings carry a "txt:"/"mkd:" prefix ahead of the payload
        match Self::decode_bulk(buf)? {
            Some(Value::Bytes(data)) if data.len() >= 4 => {
                Ok(Some(Value::Bytes(data.slice(4..))))
            }
            other => Ok(other),
        }
    }

    fn decode_array(buf: &mut Cursor<&[u8]>) -> ValkeyResult<Option<Value>> {
        buf.advance(1);

        let len_line = match Self::read_line(buf)? {
            Some(line) => line,
            None => return Ok(None),
        };

        let len = Self::line_to_string(len_line)?
            .parse::<i64>()
            .map_err(|e| ValkeyError::Protocol(format!("Invalid array length: {e}")))?;

        if len == -1 {
            return Ok(Some(Value::Nil));
        }

        let len = len as usize;
        let mut arr = Vec::with_capacity(len);

        for _ in 0..len {
            match Self::decode(buf)? {
                Some(value) => arr.push(value),
                None => return Ok(None),
            }
        }

        Ok(Some(Value::Array(arr)))
    }

    fn decode_map(buf: &mut Cursor<&[u8]>) -> ValkeyResult<Option<Value>> {
        buf.advance(1);

        let len_line = match Self::read_line(buf)? {
            Some(line) => line,
            None => return Ok(None),
        };

        let len = Self::line_to_string(len_line)?
            .parse::<usize>()
            .map_err(|e| ValkeyError::Protocol(format!("Invalid map length: {e}")))?;

        let mut entries = Vec::with_capacity(len);
        for _ in 0..len {
            let key = match Self::decode(buf)? {
                Some(value) => value,
                None => return Ok(None),
            };
            let value = match Self::decode(buf)? {
                Some(value) => value,
                None => return Ok(None),
            };
            entries.push((key, value));
        }

        Ok(Some(Value::Map(entries)))
    }

    fn read_line(buf: &mut Cursor<&[u8]>) -> ValkeyResult<Option<Vec<u8>>> {
        let start = buf.position() as usize;
        let slice = buf.get_ref();

        for i in start..slice.len().saturating_sub(1) {
            if slice[i] == b'\r' && slice[i + 1] == b'\n' {
                let line = slice[start..i].to_vec();
                buf.set_position((i + 2) as u64);
                return Ok(Some(line));
            }
        }

        Ok(None)
    }

    fn line_to_string(line: Vec<u8>) -> ValkeyResult<String> {
        String::from_utf8(line).map_err(|e| ValkeyError::Protocol(format!("Invalid UTF-8: {e}")))
    }
}

/// Build the argument vector for a command from its name and raw arguments
#[must_use]
pub fn command_args<I, A>(command: &str, args: I) -> Vec<Bytes>
where
    I: IntoIterator<Item = A>,
    A: Into<Bytes>,
{
    let mut out = vec![Bytes::from(command.as_bytes().to_vec())];
    out.extend(args.into_iter().map(Into::into));
    out
}
