pub mod classifier;
pub mod config;
pub mod constants;
pub mod energy;
pub mod state;
pub mod types;

pub use classifier::EnergyClassifier;
pub use config::VadConfig;
pub use constants::{DEFAULT_FRAME_DURATION_MS, FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};
pub use types::{VadError, VadEvent, VadState};

/// Main VAD trait for processing audio frames
pub trait VadProcessor: Send {
    fn process(&mut self, frame: &[i16]) -> Result<Option<VadEvent>, VadError>;
    fn reset(&mut self);
    fn current_state(&self) -> VadState;
}
