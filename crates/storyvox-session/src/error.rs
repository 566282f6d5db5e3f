use storyvox_foundation::error::AudioError;
use storyvox_transport::TransportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("Calibration failed: {0}")]
    Calibration(String),

    #[error("Backend rejected the session: {0}")]
    Rejected(String),
}

impl SessionError {
    /// Recoverable errors keep the session usable; unrecoverable ones
    /// require ending it. Permission denials need an explicit re-grant,
    /// so they are not retried automatically.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SessionError::Transport(_) => true,
            SessionError::Audio(e) => !e.is_permission(),
            SessionError::Calibration(_) => true,
            SessionError::Rejected(_) => true,
        }
    }
}
