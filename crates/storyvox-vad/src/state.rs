use crate::config::VadConfig;
use crate::types::{VadEvent, VadState};

/// Hysteresis state machine: sustained above-threshold runs confirm speech,
/// sustained below-threshold runs confirm silence. Transient dips during an
/// active speech run never end it early.
///
/// All timing is derived from the total-frame counter, never wall-clock, so
/// event timestamps and durations are deterministic for a given frame
/// sequence.
pub struct VadStateMachine {
    state: VadState,

    speech_frames: u32,
    silence_frames: u32,

    speech_debounce_frames: u32,
    silence_debounce_frames: u32,

    /// Frame index at which the current confirmed speech run began.
    speech_run_start_frame: Option<u64>,

    total_frames: u64,
    frame_duration_ms: u32,
}

impl VadStateMachine {
    pub fn new(config: &VadConfig) -> Self {
        Self {
            state: VadState::Silence,
            speech_frames: 0,
            silence_frames: 0,
            speech_debounce_frames: config.speech_debounce_frames(),
            silence_debounce_frames: config.silence_debounce_frames(),
            speech_run_start_frame: None,
            total_frames: 0,
            frame_duration_ms: config.frame_duration_ms,
        }
    }

    pub fn process(&mut self, is_speech_candidate: bool, energy_db: f32) -> Option<VadEvent> {
        self.total_frames += 1;

        match self.state {
            VadState::Silence => {
                if is_speech_candidate {
                    self.speech_frames += 1;
                    self.silence_frames = 0;

                    if self.speech_frames >= self.speech_debounce_frames {
                        self.state = VadState::Speech;
                        // The run began at the first frame of the debounce window.
                        let run_start = self.total_frames - u64::from(self.speech_frames);
                        self.speech_run_start_frame = Some(run_start);
                        self.speech_frames = 0;

                        return Some(VadEvent::SpeechStart {
                            timestamp_ms: run_start * u64::from(self.frame_duration_ms),
                            energy_db,
                        });
                    }
                } else {
                    self.speech_frames = 0;
                }
            }

            VadState::Speech => {
                if !is_speech_candidate {
                    self.silence_frames += 1;
                    self.speech_frames = 0;

                    if self.silence_frames >= self.silence_debounce_frames {
                        self.state = VadState::Silence;

                        let event = VadEvent::SpeechEnd {
                            timestamp_ms: self.current_timestamp_ms(),
                            duration_ms: self.speech_run_duration_ms(),
                            energy_db,
                        };

                        self.speech_run_start_frame = None;
                        self.silence_frames = 0;

                        return Some(event);
                    }
                } else {
                    self.silence_frames = 0;
                }
            }
        }

        None
    }

    pub fn current_state(&self) -> VadState {
        self.state
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn reset(&mut self) {
        self.state = VadState::Silence;
        self.speech_frames = 0;
        self.silence_frames = 0;
        self.speech_run_start_frame = None;
        self.total_frames = 0;
    }

    fn current_timestamp_ms(&self) -> u64 {
        self.total_frames * u64::from(self.frame_duration_ms)
    }

    /// Length of the speech run that just ended, excluding the trailing
    /// silence debounce window.
    fn speech_run_duration_ms(&self) -> u64 {
        let run_start = self.speech_run_start_frame.unwrap_or(0);
        let run_end = self
            .total_frames
            .saturating_sub(u64::from(self.silence_frames));
        let frames = run_end.saturating_sub(run_start).max(1);
        frames * u64::from(self.frame_duration_ms)
    }
}
