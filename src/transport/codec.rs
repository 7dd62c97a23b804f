//! NDJSON codec for message serialization
//!
//! This module provides shared encoding/decoding logic for the line-delimited
//! JSON protocol used on the control socket.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::transport::SocketError;

/// Encode a client message into NDJSON format (JSON + newline)
pub fn encode_client_message(message: &ClientMessage) -> Result<String, SocketError> {
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    Ok(json)
}

/// Encode a server message into NDJSON format
pub fn encode_server_message(message: &ServerMessage) -> Result<String, SocketError> {
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    Ok(json)
}

/// Decode a line of JSON into a ClientMessage
pub fn decode_client_message(line: &str) -> Result<ClientMessage, SocketError> {
    let message: ClientMessage = serde_json::from_str(line.trim())?;
    Ok(message)
}

/// Decode a line of JSON into a ServerMessage
pub fn decode_server_message(line: &str) -> Result<ServerMessage, SocketError> {
    let message: ServerMessage = serde_json::from_str(line.trim())?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::countdown::CountdownState;

    #[test]
    fn test_encode_client_message() {
        let message = ClientMessage::new_set_target("2026-04-27T06:00");
        let encoded = encode_client_message(&message).unwrap();
        assert!(encoded.ends_with('\n'));
        assert!(encoded.contains("\"type\":\"set_target\""));
        assert!(encoded.contains("\"target\":\"2026-04-27T06:00\""));
    }

    #[test]
    fn test_decode_hand_written_request() {
        let line = r#"{"type":"toggle_theme","id":"67e55044-10b1-426f-9247-bb680e5fe0c8"}"#;
        let decoded = decode_client_message(line).unwrap();
        assert!(matches!(decoded, ClientMessage::ToggleTheme { .. }));
        assert_eq!(
            decoded.id().to_string(),
            "67e55044-10b1-426f-9247-bb680e5fe0c8"
        );
    }

    #[test]
    fn test_tick_event_wire_format() {
        let message = ServerMessage::new_tick(CountdownState::Ended, 1000);
        let encoded = encode_server_message(&message).unwrap();
        let value: serde_json::Value = serde_json::from_str(encoded.trim()).unwrap();
        assert_eq!(value["type"], "tick");
        assert_eq!(value["countdown"]["state"], "ended");

        let decoded = decode_server_message(&encoded).unwrap();
        assert!(matches!(
            decoded,
            ServerMessage::Tick {
                countdown: CountdownState::Ended,
                ts: 1000
            }
        ));
    }

    #[test]
    fn test_garbage_is_a_serialization_error() {
        assert!(matches!(
            decode_client_message("{\"type\":\"launch\"}"),
            Err(SocketError::Serialization(_))
        ));
    }
}
