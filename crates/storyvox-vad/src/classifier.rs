use crate::{
    config::VadConfig,
    energy,
    state::VadStateMachine,
    types::{VadError, VadEvent, VadState},
    VadProcessor,
};

/// Energy-based speech/silence classifier with a calibratable noise floor.
///
/// The speech decision threshold is `noise_floor + speech_threshold_offset`.
/// Without calibration the configured absolute silence threshold stands in
/// as a working floor, so the classifier stays usable with degraded
/// accuracy rather than failing hard.
pub struct EnergyClassifier {
    config: VadConfig,
    state_machine: VadStateMachine,
    noise_floor_db: Option<f32>,
    last_energy_db: f32,
}

impl EnergyClassifier {
    pub fn new(config: VadConfig) -> Result<Self, VadError> {
        config.validate()?;
        Ok(Self {
            state_machine: VadStateMachine::new(&config),
            noise_floor_db: None,
            last_energy_db: crate::constants::DB_FLOOR,
            config,
        })
    }

    /// Set the calibrated noise-floor baseline.
    pub fn calibrate(&mut self, noise_floor_db: f32) {
        self.noise_floor_db = Some(noise_floor_db);
        tracing::debug!(noise_floor_db, "VAD calibrated");
    }

    pub fn is_calibrated(&self) -> bool {
        self.noise_floor_db.is_some()
    }

    pub fn noise_floor_db(&self) -> Option<f32> {
        self.noise_floor_db
    }

    pub fn is_speaking(&self) -> bool {
        self.state_machine.current_state() == VadState::Speech
    }

    pub fn last_energy_db(&self) -> f32 {
        self.last_energy_db
    }

    pub fn config(&self) -> &VadConfig {
        &self.config
    }

    fn speech_threshold_db(&self) -> f32 {
        let floor = self
            .noise_floor_db
            .unwrap_or(self.config.silence_threshold_db);
        floor + self.config.speech_threshold_offset_db
    }
}

impl VadProcessor for EnergyClassifier {
    fn process(&mut self, frame: &[i16]) -> Result<Option<VadEvent>, VadError> {
        let expected = self.config.frame_size_samples();
        if frame.len() != expected {
            return Err(VadError::FrameSize {
                expected,
                got: frame.len(),
            });
        }

        let energy_db = energy::calculate_dbfs(frame);
        self.last_energy_db = energy_db;

        let is_speech_candidate = energy_db > self.speech_threshold_db();
        Ok(self.state_machine.process(is_speech_candidate, energy_db))
    }

    /// Clears running counters and the speaking state. Configuration and the
    /// calibrated noise floor are kept.
    fn reset(&mut self) {
        self.state_machine.reset();
        self.last_energy_db = crate::constants::DB_FLOOR;
    }

    fn current_state(&self) -> VadState {
        self.state_machine.current_state()
    }
}
