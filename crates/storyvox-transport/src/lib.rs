pub mod backoff;
pub mod error;
pub mod protocol;
pub mod transport;

pub use backoff::reconnect_delay;
pub use error::TransportError;
pub use protocol::{ClientMessage, ServerMessage};
pub use transport::{
    ConnectionSnapshot, DisconnectReason, LinkStatus, SessionTransport, TransportConfig,
    TransportStreams,
};
