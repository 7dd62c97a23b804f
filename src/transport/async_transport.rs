//! Async transport implementation using tokio
//!
//! This module provides the client used by the CLI subcommands and the
//! connection wrapper used on the server side.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::transport::{SocketError, codec};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Async transport for socket communication (stateless client)
pub struct AsyncTransport {
    socket_path: String,
}

/// A line-delimited connection, usable from either end
pub struct AsyncConnection {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl AsyncTransport {
    /// Create a new async transport with the given socket path
    pub fn new(socket_path: String) -> Self {
        Self { socket_path }
    }

    /// Connect to the socket and return a stateful connection
    pub async fn connect(&self) -> Result<AsyncConnection, SocketError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::ConnectionRefused => SocketError::Connection(
                    "Countdown is not running. Use 'countdown run' to start it.".to_string(),
                ),
                std::io::ErrorKind::NotFound => SocketError::Connection(format!(
                    "Control socket not found at {}. Use 'countdown run' to start the countdown.",
                    self.socket_path
                )),
                _ => SocketError::Connection(format!(
                    "Failed to connect to countdown at {}: {}",
                    self.socket_path, e
                )),
            })?;

        Ok(AsyncConnection::new(stream))
    }

    /// Send a client message and receive a server response (one-shot request-response)
    pub async fn send_request(&self, message: &ClientMessage) -> Result<ServerMessage, SocketError> {
        let mut conn = self.connect().await?;
        conn.write_client_message(message).await?;

        let response = tokio::time::timeout(REQUEST_TIMEOUT, conn.read_server_message())
            .await
            .map_err(|_| SocketError::Connection("Request timed out".to_string()))??
            .ok_or_else(|| SocketError::Connection("No response from countdown".to_string()))?;

        Ok(response)
    }

    /// Subscribe to tick events; the returned connection yields `Tick` messages
    pub async fn subscribe(&self) -> Result<AsyncConnection, SocketError> {
        let mut conn = self.connect().await?;
        conn.write_client_message(&ClientMessage::new_subscribe())
            .await?;

        match conn.read_server_message().await? {
            Some(ServerMessage::Subscribed { .. }) => Ok(conn),
            Some(ServerMessage::Error { error, .. }) => Err(SocketError::Connection(error)),
            Some(other) => Err(SocketError::Connection(format!(
                "Unexpected response to subscribe: {:?}",
                other
            ))),
            None => Err(SocketError::Connection(
                "Connection closed before subscription was confirmed".to_string(),
            )),
        }
    }
}

impl AsyncConnection {
    pub fn new(stream: UnixStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    /// Read a client message from the connection (server-side)
    ///
    /// Safe to use as a `tokio::select!` branch; partial lines are kept.
    pub async fn read_client_message(&mut self) -> Result<Option<ClientMessage>, SocketError> {
        match self.lines.next_line().await? {
            None => Ok(None), // EOF - connection closed
            Some(line) => Ok(Some(codec::decode_client_message(&line)?)),
        }
    }

    /// Read a server message from the connection (client-side)
    pub async fn read_server_message(&mut self) -> Result<Option<ServerMessage>, SocketError> {
        match self.lines.next_line().await? {
            None => Ok(None),
            Some(line) => Ok(Some(codec::decode_server_message(&line)?)),
        }
    }

    /// Write a client message to the connection (client-side)
    pub async fn write_client_message(&mut self, message: &ClientMessage) -> Result<(), SocketError> {
        let encoded = codec::encode_client_message(message)?;
        self.writer.write_all(encoded.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Write a server message to the connection (server-side)
    pub async fn write_server_message(&mut self, message: &ServerMessage) -> Result<(), SocketError> {
        let encoded = codec::encode_server_message(message)?;
        self.writer.write_all(encoded.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
