//! Connection and message handling
//!
//! This module handles individual client connections and message processing.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::transport::{AsyncConnection, SocketError};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};

use super::{Command, SUBSCRIBER_QUEUE};

type ServerResult<T> = std::result::Result<T, SocketError>;

pub(super) async fn handle_connection(
    stream: UnixStream,
    commands: mpsc::Sender<Command>,
) -> ServerResult<()> {
    let mut conn = AsyncConnection::new(stream);

    // Events only flow once the client subscribes
    let (event_tx, mut event_rx) = mpsc::channel(SUBSCRIBER_QUEUE);

    loop {
        tokio::select! {
            // Read from client
            result = conn.read_client_message() => {
                let Some(request) = result? else {
                    // Connection closed
                    break;
                };
                log::debug!("Received request: {:?}", request);

                let response = process_message(request, &commands, &event_tx).await;
                conn.write_server_message(&response).await?;
            }

            // Send events to subscriber
            Some(event) = event_rx.recv() => {
                conn.write_server_message(&event).await?;
            }
        }
    }

    Ok(())
}

async fn process_message(
    request: ClientMessage,
    commands: &mpsc::Sender<Command>,
    events: &mpsc::Sender<ServerMessage>,
) -> ServerMessage {
    let id = request.id();
    let subscribing = matches!(request, ClientMessage::Subscribe { .. });
    let (reply, snapshot) = oneshot::channel();

    let command = match request {
        ClientMessage::SetTarget { target, .. } => Command::SetTarget { target, reply },
        ClientMessage::Status { .. } => Command::Status { reply },
        ClientMessage::ToggleTheme { .. } => Command::ToggleTheme { reply },
        ClientMessage::Subscribe { .. } => Command::Subscribe {
            events: events.clone(),
            reply,
        },
    };

    if commands.send(command).await.is_err() {
        return ServerMessage::new_error(id, "Countdown loop is not running");
    }

    match snapshot.await {
        Ok(_) if subscribing => ServerMessage::new_subscribed(id),
        Ok(snapshot) => ServerMessage::new_status(id, snapshot),
        Err(_) => ServerMessage::new_error(id, "Countdown loop dropped the request"),
    }
}
