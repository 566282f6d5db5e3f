//! Interaction state machine for StoryVox voice sessions.
//!
//! Orchestrates the session lifecycle: noise calibration, transport
//! connection, VAD-driven speech signaling, AI response handling, and the
//! passive/interactive mode switch that hands audio focus between story
//! playback and live listening.

pub mod error;
pub mod machine;
pub mod playback;
pub mod session;

pub use error::SessionError;
pub use machine::{
    InteractionStateMachine, SessionCommand, SessionLink, SessionNotice, SessionObservers,
    VoiceCapture,
};
pub use playback::PlaybackControl;
pub use session::{LastError, Session, SessionMode, SessionStatus, StoryContext};
