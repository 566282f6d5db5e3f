//! Audio processing constants for the VAD pipeline

/// Standard sample rate for all VAD processing (Hz)
pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// Default frame duration in milliseconds
pub const DEFAULT_FRAME_DURATION_MS: u32 = 20;

/// Standard frame size for all VAD processing (samples)
/// At 16kHz, 320 samples = 20ms frames
pub const FRAME_SIZE_SAMPLES: usize =
    (SAMPLE_RATE_HZ as usize * DEFAULT_FRAME_DURATION_MS as usize) / 1000;

/// Standard number of channels for mono audio processing
pub const CHANNELS_MONO: u16 = 1;

/// dBFS value reported for frames with effectively zero energy
pub const DB_FLOOR: f32 = -100.0;
