use thiserror::Error;

/// Classification state of the energy classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    Silence,
    Speech,
}

/// Event emitted on a classification edge.
///
/// Timestamps are derived from the total-frame counter times the frame
/// duration, so they are monotonic within one classifier instance and
/// independent of wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VadEvent {
    SpeechStart {
        timestamp_ms: u64,
        energy_db: f32,
    },
    SpeechEnd {
        timestamp_ms: u64,
        /// Length of the confirmed speech run, accurate to within one frame.
        duration_ms: u64,
        energy_db: f32,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VadError {
    #[error("Expected {expected} samples, got {got}")]
    FrameSize { expected: usize, got: usize },

    #[error("Invalid VAD config: {0}")]
    InvalidConfig(String),
}
