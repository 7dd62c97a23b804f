use crate::countdown::CountdownState;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Point-in-time view of the running countdown
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Target text as entered
    pub target: String,
    /// Whether the target parsed to a real date
    pub valid: bool,
    pub countdown: CountdownState,
    pub dark_mode: bool,
}

/// Messages sent from clients to the countdown
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Replace the countdown target
    SetTarget { id: Uuid, target: String },
    /// Request current status
    Status { id: Uuid },
    /// Switch between light and dark theme
    ToggleTheme { id: Uuid },
    /// Subscribe to per-tick events
    Subscribe { id: Uuid },
}

impl ClientMessage {
    /// Create a new SetTarget request
    pub fn new_set_target(target: impl Into<String>) -> Self {
        ClientMessage::SetTarget {
            id: Uuid::new_v4(),
            target: target.into(),
        }
    }

    /// Create a new Status request
    pub fn new_status() -> Self {
        ClientMessage::Status { id: Uuid::new_v4() }
    }

    /// Create a new ToggleTheme request
    pub fn new_toggle_theme() -> Self {
        ClientMessage::ToggleTheme { id: Uuid::new_v4() }
    }

    /// Create a new Subscribe request
    pub fn new_subscribe() -> Self {
        ClientMessage::Subscribe { id: Uuid::new_v4() }
    }

    pub fn id(&self) -> Uuid {
        match self {
            ClientMessage::SetTarget { id, .. }
            | ClientMessage::Status { id }
            | ClientMessage::ToggleTheme { id }
            | ClientMessage::Subscribe { id } => *id,
        }
    }
}

/// Messages sent from the countdown to clients
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Status information (in response to any request except subscribe)
    Status { id: Uuid, snapshot: Snapshot },
    /// Subscription confirmation
    Subscribed { id: Uuid },
    /// Countdown state broadcast to subscribers after every tick
    Tick {
        countdown: CountdownState,
        /// Milliseconds since the Unix epoch at the time of the tick
        ts: i64,
    },
    /// Error response
    Error { id: Uuid, error: String },
}

impl ServerMessage {
    pub fn new_status(id: Uuid, snapshot: Snapshot) -> Self {
        ServerMessage::Status { id, snapshot }
    }

    pub fn new_subscribed(id: Uuid) -> Self {
        ServerMessage::Subscribed { id }
    }

    pub fn new_tick(countdown: CountdownState, ts: i64) -> Self {
        ServerMessage::Tick { countdown, ts }
    }

    pub fn new_error(id: Uuid, error: impl Into<String>) -> Self {
        ServerMessage::Error {
            id,
            error: error.into(),
        }
    }
}
