//! Control socket server
//!
//! Listens for client connections and forwards their requests to the
//! countdown loop as `Command`s. The loop owns all countdown state; the
//! server never touches it directly.

mod handler;

use crate::protocol::{ServerMessage, Snapshot};
use crate::transport::SocketError;
use std::path::{Path, PathBuf};
use tokio::net::UnixListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use handler::handle_connection;

// Server result type using SocketError for structured error handling
type ServerResult<T> = std::result::Result<T, SocketError>;

/// Ticks buffered per subscriber; a client that falls further behind misses ticks
pub const SUBSCRIBER_QUEUE: usize = 8;

/// Requests forwarded to the countdown loop
#[derive(Debug)]
pub enum Command {
    SetTarget {
        target: String,
        reply: oneshot::Sender<Snapshot>,
    },
    Status {
        reply: oneshot::Sender<Snapshot>,
    },
    ToggleTheme {
        reply: oneshot::Sender<Snapshot>,
    },
    Subscribe {
        events: mpsc::Sender<ServerMessage>,
        reply: oneshot::Sender<Snapshot>,
    },
}

pub struct ControlServer {
    listener: UnixListener,
    path: PathBuf,
}

impl ControlServer {
    pub fn bind<P: AsRef<Path>>(socket_path: P) -> ServerResult<Self> {
        let path = socket_path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Remove existing socket file if it exists
        if path.exists() {
            std::fs::remove_file(&path)?;
        }

        let listener = UnixListener::bind(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                SocketError::Connection(format!(
                    "Countdown already running at socket: {}",
                    path.display()
                ))
            } else {
                SocketError::Connection(format!("Failed to bind socket: {}", e))
            }
        })?;

        // Set socket permissions to 0600 (owner read/write only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut permissions = std::fs::metadata(&path)
                .map_err(|e| {
                    SocketError::Connection(format!("Failed to read socket metadata: {}", e))
                })?
                .permissions();
            permissions.set_mode(0o600);
            std::fs::set_permissions(&path, permissions).map_err(|e| {
                SocketError::Connection(format!("Failed to set socket permissions: {}", e))
            })?;
        }

        Ok(Self { listener, path })
    }

    /// Run the accept loop in the background until the handle is dropped
    pub fn spawn(self, commands: mpsc::Sender<Command>) -> ServerHandle {
        log::info!("Control socket listening at {}", self.path.display());
        let path = self.path.clone();
        let task = tokio::spawn(accept_loop(self.listener, commands));
        ServerHandle { task, path }
    }
}

async fn accept_loop(listener: UnixListener, commands: mpsc::Sender<Command>) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let commands = commands.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, commands).await {
                        log::warn!("Error handling connection: {}", e);
                    }
                });
            }
            Err(e) => {
                log::warn!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Owns the running accept loop; dropping it stops the server and removes the socket
pub struct ServerHandle {
    task: JoinHandle<()>,
    path: PathBuf,
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.task.abort();
        if self.path.exists()
            && let Err(e) = std::fs::remove_file(&self.path)
        {
            log::warn!("Failed to remove socket file: {}", e);
        }
    }
}
