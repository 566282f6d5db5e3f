use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Malformed message from backend: {0}")]
    Protocol(String),

    #[error("Reconnect attempt {attempt} of {max} failed: {reason}")]
    ReconnectFailed {
        attempt: u32,
        max: u32,
        reason: String,
    },

    #[error("Automatic reconnection exhausted after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
