//! TCP native client
//!
//! Low-level single-node client over a tokio TCP stream: connect with
//! timeout and keepalive, authenticate, negotiate RESP3 where the server
//! supports it, and speak the request/reply protocol. Implements
//! [`NativeClient`] including pipelined and atomic batches.

use async_trait::async_trait;
use bytes::{Buf, Bytes, BytesMut};
use std::io::Cursor;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};
use valkey_bridge_core::{
    config::ConnectionConfig,
    error::{ValkeyError, ValkeyResult},
    value::Value,
};

use crate::driver::{BatchEntry, NativeClient};
use crate::protocol::{command_args, RespDecoder, RespEncoder};

/// A connection to one server over TCP
pub struct TcpClient {
    stream: TcpStream,
    read_buffer: BytesMut,
    config: ConnectionConfig,
    resp3: bool,
}

impl TcpClient {
    /// Connect, authenticate and negotiate the protocol
    ///
    /// # Errors
    ///
    /// Returns a connection error when the server is unreachable within
    /// the configured timeout, or an authentication error.
    pub async fn connect(host: &str, port: u16, config: ConnectionConfig) -> ValkeyResult<Self> {
        let addr = format!("{host}:{port}");
        debug!("connecting to {addr}");

        let stream = timeout(config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| ValkeyError::Timeout)?
            .map_err(|e| ValkeyError::Connection(format!("Failed to connect to {addr}: {e}")))?;

        let stream = if let Some(keepalive_time) = config.tcp_keepalive {
            let socket = socket2::Socket::from(stream.into_std()?);
            let keepalive = socket2::TcpKeepalive::new().with_time(keepalive_time);
            socket.set_tcp_keepalive(&keepalive).map_err(|e| {
                ValkeyError::Connection(format!("Failed to set TCP keepalive: {e}"))
            })?;
            TcpStream::from_std(socket.into())?
        } else {
            stream
        };

        let mut client = Self {
            stream,
            read_buffer: BytesMut::with_capacity(8192),
            config,
            resp3: false,
        };

        client.handshake().await?;
        Ok(client)
    }

    /// Negotiate RESP3 and authenticate; falls back to RESP2 with a plain
    /// AUTH against servers without HELLO
    async fn handshake(&mut self) -> ValkeyResult<()> {
        let mut hello: Vec<Bytes> = vec![Bytes::from_static(b"3")];
        if let Some(password) = self.config.password.clone() {
            hello.push(Bytes::from_static(b"AUTH"));
            let username = self.config.username.clone().unwrap_or_else(|| "default".to_string());
            hello.push(Bytes::from(username.into_bytes()));
            hello.push(Bytes::from(password.into_bytes()));
        }

        match self.roundtrip(command_args("HELLO", hello)).await {
            Ok(Value::Map(_) | Value::Array(_)) => {
                debug!("negotiated RESP3");
                self.resp3 = true;
            }
            Ok(other) => {
                return Err(ValkeyError::Protocol(format!(
                    "Unexpected HELLO reply: {other:?}"
                )))
            }
            Err(ValkeyError::Server(msg)) => {
                debug!("HELLO rejected ({msg}); staying on RESP2");
                if let Some(password) = self.config.password.clone() {
                    let mut auth = Vec::new();
                    if let Some(username) = self.config.username.clone() {
                        auth.push(Bytes::from(username.into_bytes()));
                    }
                    auth.push(Bytes::from(password.into_bytes()));
                    let reply = self.roundtrip(command_args("AUTH", auth)).await;
                    match reply {
                        Ok(Value::Simple(s)) if s == "OK" => {}
                        Ok(other) => {
                            return Err(ValkeyError::Auth(format!(
                                "Unexpected AUTH reply: {other:?}"
                            )))
                        }
                        Err(err) => return Err(ValkeyError::Auth(err.to_string())),
                    }
                }
            }
            Err(err) => return Err(err),
        }

        if self.config.database != 0 {
            let db = Bytes::from(self.config.database.to_string().into_bytes());
            match self.roundtrip(command_args("SELECT", [db])).await? {
                Value::Simple(s) if s == "OK" => {}
                other => {
                    return Err(ValkeyError::Protocol(format!(
                        "Unexpected SELECT reply: {other:?}"
                    )))
                }
            }
        }

        Ok(())
    }

    /// Check whether RESP3 was negotiated
    #[must_use]
    pub fn is_resp3(&self) -> bool {
        self.resp3
    }

    async fn send_frame(&mut self, frame: &[u8]) -> ValkeyResult<()> {
        timeout(self.config.operation_timeout, self.stream.write_all(frame))
            .await
            .map_err(|_| ValkeyError::Timeout)?
            .map_err(ValkeyError::Io)
    }

    /// Read one complete reply from the stream
    async fn read_reply(&mut self) -> ValkeyResult<Value> {
        loop {
            let mut cursor = Cursor::new(&self.read_buffer[..]);
            if let Some(value) = RespDecoder::decode(&mut cursor)? {
                let consumed = cursor.position() as usize;
                self.read_buffer.advance(consumed);
                return Ok(value);
            }

            let read = timeout(
                self.config.operation_timeout,
                self.stream.read_buf(&mut self.read_buffer),
            )
            .await
            .map_err(|_| ValkeyError::Timeout)??;

            if read == 0 {
                return Err(ValkeyError::Connection(
                    "Connection closed by server".to_string(),
                ));
            }
        }
    }

    /// One write-then-read exchange; error replies are raised, redirects
    /// surfaced as [`ValkeyError::Moved`]/[`ValkeyError::Ask`]
    async fn roundtrip(&mut self, args: Vec<Bytes>) -> ValkeyResult<Value> {
        let frame = RespEncoder::encode_command(&args);
        self.send_frame(&frame).await?;
        let reply = self.read_reply().await?;

        if let Value::Error(msg) = reply {
            if let Some(redirect) = ValkeyError::parse_redirect(&msg) {
                return Err(redirect);
            }
            return Err(ValkeyError::Server(msg));
        }
        Ok(reply)
    }
}

fn entry_from_reply(reply: Value) -> BatchEntry {
    match reply {
        Value::Error(msg) => Err(ValkeyError::Server(msg)),
        other => Ok(other),
    }
}

#[async_trait]
impl NativeClient for TcpClient {
    async fn request(&mut self, args: Vec<Bytes>) -> ValkeyResult<Value> {
        self.roundtrip(args).await
    }

    async fn request_batch(
        &mut self,
        commands: Vec<Vec<Bytes>>,
        atomic: bool,
    ) -> ValkeyResult<Option<Vec<BatchEntry>>> {
        if commands.is_empty() {
            return Ok(Some(Vec::new()));
        }

        if atomic {
            self.exec_transaction(commands).await
        } else {
            self.exec_pipeline(commands).await.map(Some)
        }
    }
}

impl TcpClient {
    /// Write all frames in one burst, then read one reply per command
    async fn exec_pipeline(&mut self, commands: Vec<Vec<Bytes>>) -> ValkeyResult<Vec<BatchEntry>> {
        let mut burst = BytesMut::new();
        for command in &commands {
            burst.extend_from_slice(&RespEncoder::encode_command(command));
        }
        let burst = burst.freeze();
        self.send_frame(&burst).await?;

        let mut entries = Vec::with_capacity(commands.len());
        for _ in 0..commands.len() {
            entries.push(entry_from_reply(self.read_reply().await?));
        }
        Ok(entries)
    }

    /// Wrap the commands in MULTI/EXEC; a nil EXEC reply means the
    /// transaction was aborted by a watched-key change
    async fn exec_transaction(
        &mut self,
        commands: Vec<Vec<Bytes>>,
    ) -> ValkeyResult<Option<Vec<BatchEntry>>> {
        let mut burst = BytesMut::new();
        burst.extend_from_slice(&RespEncoder::encode_command(&[Bytes::from_static(b"MULTI")]));
        for command in &commands {
            burst.extend_from_slice(&RespEncoder::encode_command(command));
        }
        burst.extend_from_slice(&RespEncoder::encode_command(&[Bytes::from_static(b"EXEC")]));
        let burst = burst.freeze();
        self.send_frame(&burst).await?;

        // MULTI acknowledgment
        match self.read_reply().await? {
            Value::Simple(s) if s == "OK" => {}
            Value::Error(msg) => return Err(ValkeyError::Server(msg)),
            other => {
                return Err(ValkeyError::Protocol(format!(
                    "Unexpected MULTI reply: {other:?}"
                )))
            }
        }

        // One QUEUED (or queue-time error) per command
        let mut queue_error = None;
        for _ in 0..commands.len() {
            if let Value::Error(msg) = self.read_reply().await? {
                warn!("command rejected at queue time: {msg}");
                queue_error.get_or_insert(msg);
            }
        }

        match self.read_reply().await? {
            // Abort through a watched-key change
            Value::Nil => Ok(None),
            Value::Error(msg) => Err(ValkeyError::Server(msg)),
            Value::Array(replies) => {
                if let Some(msg) = queue_error {
                    return Err(ValkeyError::Server(msg));
                }
                Ok(Some(replies.into_iter().map(entry_from_reply).collect()))
            }
            other => Err(ValkeyError::Protocol(format!(
                "Unexpected EXEC reply: {other:?}"
            ))),
        }
    }
}
