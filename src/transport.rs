//! Transport layer for control socket communication
//!
//! The transport layer is organized into:
//! - `codec`: NDJSON encoding/decoding for messages
//! - `async_transport`: Tokio-based client and connection halves

use thiserror::Error;

mod async_transport;
mod codec;

pub use async_transport::{AsyncConnection, AsyncTransport};

/// Default Unix socket path for the countdown control socket
pub const DEFAULT_SOCKET_PATH: &str = "/run/user/$UID/countdown/countdown.sock";

/// Socket error types
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("Socket connection error: {0}")]
    Connection(String),
    #[error("Socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn get_uid() -> String {
    std::env::var("UID").unwrap_or_else(|_| {
        // Fallback: use nix to get actual UID
        nix::unistd::getuid().to_string()
    })
}

/// Expand `$UID` and `$RUNTIME_DIRECTORY` in a socket path
pub fn expand_socket_path(path: &str) -> String {
    let expanded = path.replace("$UID", &get_uid());

    // Support $RUNTIME_DIRECTORY for systemd RuntimeDirectory=
    if let Ok(runtime_dir) = std::env::var("RUNTIME_DIRECTORY") {
        expanded.replace("$RUNTIME_DIRECTORY", &runtime_dir)
    } else {
        expanded
    }
}
