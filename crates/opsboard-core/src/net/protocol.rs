use super::messages::{ClientMessage, ServerMessage};

/// Maximum size of an inbound client frame in bytes. Outbound frames are not
/// capped: a snapshot grows with the roster.
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024; // 256 KiB

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty message")]
    EmptyMessage,
    #[error("payload too large: {0} bytes (max {MAX_MESSAGE_SIZE})")]
    PayloadTooLarge(usize),
    #[error("serialize error: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("deserialize error: {0}")]
    Deserialize(#[source] serde_json::Error),
}

fn encode<T: serde::Serialize>(msg: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(ProtocolError::Serialize)
}

fn decode<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, ProtocolError> {
    if text.trim().is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    serde_json::from_str(text).map_err(ProtocolError::Deserialize)
}

/// Encode a `ServerMessage` as a JSON text frame.
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    encode(msg)
}

/// Encode a `ClientMessage` as a JSON text frame.
pub fn encode_client_message(msg: &ClientMessage) -> Result<String, ProtocolError> {
    encode(msg)
}

/// Decode a JSON text frame into a `ClientMessage`.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(text.len()));
    }
    decode(text)
}

/// Decode a JSON text frame into a `ServerMessage`.
pub fn decode_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    decode(text)
}
