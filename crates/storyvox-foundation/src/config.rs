use serde::{Deserialize, Serialize};

/// Capture-side audio parameters shared across the pipeline.
///
/// The whole pipeline runs mono 16-bit PCM at a single sample rate; the
/// capture thread requests this configuration from the device and the
/// chunker, classifier, and encoder all derive frame sizes from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate_hz: u32,
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 16_000,
            channels: 1,
        }
    }
}

impl AudioConfig {
    /// Samples per frame for a given frame duration.
    pub fn samples_per_frame(&self, frame_duration_ms: u32) -> usize {
        (self.sample_rate_hz as usize * frame_duration_ms as usize) / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_frame_sizing() {
        let cfg = AudioConfig::default();
        // 16 kHz * 20 ms = 320 samples (640 bytes at 16-bit)
        assert_eq!(cfg.samples_per_frame(20), 320);
        assert_eq!(cfg.samples_per_frame(10), 160);
        assert_eq!(cfg.samples_per_frame(30), 480);
    }
}
