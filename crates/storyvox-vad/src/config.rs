use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_FRAME_DURATION_MS, SAMPLE_RATE_HZ};
use crate::types::VadError;

/// Immutable configuration for the energy classifier.
///
/// `silence_threshold_db` doubles as the working noise floor when no
/// calibration has been run; it sits well below any calibrated floor plus
/// the speech offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VadConfig {
    pub sample_rate_hz: u32,
    /// Must be 10, 20, or 30 ms — the only durations for which the energy
    /// window is well-defined.
    pub frame_duration_ms: u32,
    /// Speech decision threshold is `noise_floor + this offset`.
    pub speech_threshold_offset_db: f32,
    /// Absolute floor used as the noise floor when uncalibrated.
    pub silence_threshold_db: f32,
    /// A speech run must sustain at least this long before SpeechStart.
    pub min_speech_duration_ms: u32,
    /// A silence run must sustain at least this long before SpeechEnd.
    pub min_silence_duration_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: SAMPLE_RATE_HZ,
            frame_duration_ms: DEFAULT_FRAME_DURATION_MS,
            speech_threshold_offset_db: 15.0,
            silence_threshold_db: -40.0,
            min_speech_duration_ms: 100,
            min_silence_duration_ms: 300,
        }
    }
}

impl VadConfig {
    pub fn validate(&self) -> Result<(), VadError> {
        if !matches!(self.frame_duration_ms, 10 | 20 | 30) {
            return Err(VadError::InvalidConfig(format!(
                "frame_duration_ms must be 10, 20, or 30 (got {})",
                self.frame_duration_ms
            )));
        }
        if self.sample_rate_hz == 0 {
            return Err(VadError::InvalidConfig("sample_rate_hz is zero".into()));
        }
        Ok(())
    }

    pub fn frame_size_samples(&self) -> usize {
        (self.sample_rate_hz as usize * self.frame_duration_ms as usize) / 1000
    }

    /// Consecutive speech frames required to confirm a start.
    pub fn speech_debounce_frames(&self) -> u32 {
        (self.min_speech_duration_ms / self.frame_duration_ms).max(1)
    }

    /// Consecutive silence frames required to confirm an end.
    pub fn silence_debounce_frames(&self) -> u32 {
        (self.min_silence_duration_ms / self.frame_duration_ms).max(1)
    }
}
