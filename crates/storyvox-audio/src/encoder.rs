use storyvox_foundation::{AudioConfig, AudioError};
use storyvox_vad::{EnergyClassifier, VadConfig, VadEvent, VadProcessor};

use super::chunker::AudioFrame;

/// Configuration for the speech encoding stage.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub audio: AudioConfig,
    pub vad: VadConfig,
    /// When false every frame is encoded regardless of classification.
    pub vad_enabled: bool,
    /// Drop unvoiced frames entirely instead of encoding them. Protocol
    /// assumption: the backend reconstructs timing without continuous
    /// silence frames.
    pub drop_silence: bool,
    pub bitrate_bps: i32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            vad: VadConfig::default(),
            vad_enabled: true,
            drop_silence: true,
            bitrate_bps: 24_000,
        }
    }
}

/// Output of one frame pass through the encoder.
#[derive(Debug, Default)]
pub struct FrameOutput {
    /// Encoded bytes for transport, absent when the frame was gated out.
    pub encoded: Option<Vec<u8>>,
    /// Classification edge crossed by this frame, if any.
    pub event: Option<VadEvent>,
}

/// Compresses voiced frames with Opus (voip profile) and gates silence by
/// the classifier's current decision.
pub struct FrameEncoder {
    encoder: opus::Encoder,
    classifier: EnergyClassifier,
    config: EncoderConfig,
}

impl FrameEncoder {
    /// Acquire codec resources. Fails fatally when the codec rejects the
    /// pipeline's sample rate or channel count.
    pub fn new(config: EncoderConfig) -> Result<Self, AudioError> {
        let classifier = EnergyClassifier::new(config.vad)
            .map_err(|e| AudioError::Encoder(format!("VAD config: {e}")))?;

        let mut encoder = opus::Encoder::new(
            config.audio.sample_rate_hz,
            opus::Channels::Mono,
            opus::Application::Voip,
        )
        .map_err(|e| AudioError::Encoder(format!("Failed to create Opus encoder: {e}")))?;

        encoder
            .set_bitrate(opus::Bitrate::Bits(config.bitrate_bps))
            .map_err(|e| AudioError::Encoder(format!("Failed to set bitrate: {e}")))?;

        Ok(Self {
            encoder,
            classifier,
            config,
        })
    }

    pub fn calibrate(&mut self, noise_floor_db: f32) {
        self.classifier.calibrate(noise_floor_db);
    }

    pub fn is_speaking(&self) -> bool {
        self.classifier.is_speaking()
    }

    pub fn reset_vad(&mut self) {
        self.classifier.reset();
    }

    /// Run one fixed-size frame through classification and, when voiced (or
    /// VAD is disabled), Opus encoding.
    pub fn process_frame(&mut self, frame: &AudioFrame) -> Result<FrameOutput, AudioError> {
        let event = self
            .classifier
            .process(&frame.samples)
            .map_err(|e| AudioError::Encoder(e.to_string()))?;

        let voiced = self.classifier.is_speaking();
        let should_encode = !self.config.vad_enabled || voiced || !self.config.drop_silence;

        let encoded = if should_encode {
            // 4000 bytes is far above any 20ms voip frame at 24 kbps
            let bytes = self
                .encoder
                .encode_vec(&frame.samples, 4000)
                .map_err(|e| AudioError::Encoder(format!("Opus encode: {e}")))?;
            Some(bytes)
        } else {
            None
        };

        Ok(FrameOutput { encoded, event })
    }
}
