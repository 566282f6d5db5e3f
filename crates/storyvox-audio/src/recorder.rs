use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use storyvox_foundation::AudioError;
use storyvox_telemetry::{PipelineMetrics, PipelineStage};
use storyvox_vad::VadEvent;

use super::capture::CaptureThread;
use super::chunker::{AudioFrame, ChunkerConfig, FrameChunker};
use super::encoder::{EncoderConfig, FrameEncoder};
use super::frame_reader::FrameReader;
use super::ring_buffer::AudioRingBuffer;

/// Lifecycle states observable by consumers of the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Initialized,
    Recording,
    Paused,
    Stopped,
}

/// The capture-to-encoded-bytes surface of the pipeline.
///
/// Owns the capture thread, the chunker task, and the encode task, and
/// exposes four broadcast streams: encoded audio chunks (for transport),
/// raw fixed-size frames (for calibration and level meters), lifecycle
/// state changes, and VAD events.
///
/// `dispose()` consumes the recorder; resources are released exactly once.
pub struct Recorder {
    config: EncoderConfig,
    device_name: Option<String>,
    metrics: Option<Arc<PipelineMetrics>>,

    encoded_tx: broadcast::Sender<Vec<u8>>,
    raw_tx: broadcast::Sender<AudioFrame>,
    state_tx: broadcast::Sender<RecorderState>,
    vad_tx: broadcast::Sender<VadEvent>,

    floor_tx: watch::Sender<Option<f32>>,
    paused: Arc<AtomicBool>,

    state: RecorderState,
    capture: Option<CaptureThread>,
    chunker_handle: Option<JoinHandle<()>>,
    encode_handle: Option<JoinHandle<()>>,
}

impl Recorder {
    /// Acquire encoder resources up front so a broken audio backend fails
    /// here rather than mid-session.
    pub fn new(config: EncoderConfig, device_name: Option<String>) -> Result<Self, AudioError> {
        // Probe the codec now; the real encoder is built per recording run.
        FrameEncoder::new(config.clone())?;

        let (encoded_tx, _) = broadcast::channel(256);
        let (raw_tx, _) = broadcast::channel(256);
        let (state_tx, _) = broadcast::channel(16);
        let (vad_tx, _) = broadcast::channel(64);
        let (floor_tx, _) = watch::channel(None);

        Ok(Self {
            config,
            device_name,
            metrics: None,
            encoded_tx,
            raw_tx,
            state_tx,
            vad_tx,
            floor_tx,
            paused: Arc::new(AtomicBool::new(false)),
            state: RecorderState::Initialized,
            capture: None,
            chunker_handle: None,
            encode_handle: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn encoded_audio(&self) -> broadcast::Receiver<Vec<u8>> {
        self.encoded_tx.subscribe()
    }

    pub fn raw_frames(&self) -> broadcast::Receiver<AudioFrame> {
        self.raw_tx.subscribe()
    }

    pub fn states(&self) -> broadcast::Receiver<RecorderState> {
        self.state_tx.subscribe()
    }

    pub fn vad_events(&self) -> broadcast::Receiver<VadEvent> {
        self.vad_tx.subscribe()
    }

    /// Start the microphone and the full encode pipeline. Permission
    /// denial surfaces as `AudioError::PermissionDenied` — the caller must
    /// show it to the user, not swallow it.
    pub fn start_recording(&mut self) -> Result<(), AudioError> {
        if matches!(self.state, RecorderState::Recording | RecorderState::Paused) {
            return Err(AudioError::CaptureAlreadyRunning);
        }

        let frame_size = self.config.vad.frame_size_samples();
        let ring = AudioRingBuffer::new(frame_size * 64);
        let (producer, consumer) = ring.split();

        let (capture, dev_cfg) =
            CaptureThread::spawn(self.config.audio, producer, self.device_name.clone())?;

        let reader = FrameReader::new(consumer, dev_cfg.sample_rate, dev_cfg.channels);
        let chunker_cfg = ChunkerConfig {
            frame_size_samples: frame_size,
            sample_rate_hz: self.config.audio.sample_rate_hz,
        };
        let mut chunker = FrameChunker::new(reader, self.raw_tx.clone(), chunker_cfg);
        if let Some(m) = &self.metrics {
            chunker = chunker.with_metrics(m.clone());
        }
        let chunker_handle = chunker.spawn();

        let encode_handle = spawn_encode_task(
            FrameEncoder::new(self.config.clone())?,
            self.raw_tx.subscribe(),
            self.encoded_tx.clone(),
            self.vad_tx.clone(),
            self.floor_tx.subscribe(),
            self.paused.clone(),
            self.metrics.clone(),
        );

        self.capture = Some(capture);
        self.chunker_handle = Some(chunker_handle);
        self.encode_handle = Some(encode_handle);
        self.paused.store(false, Ordering::SeqCst);
        self.set_state(RecorderState::Recording);
        Ok(())
    }

    /// No-op unless currently recording.
    pub fn pause_recording(&mut self) {
        if self.state == RecorderState::Recording {
            self.paused.store(true, Ordering::SeqCst);
            self.set_state(RecorderState::Paused);
        }
    }

    /// No-op unless currently paused.
    pub fn resume_recording(&mut self) {
        if self.state == RecorderState::Paused {
            self.paused.store(false, Ordering::SeqCst);
            self.set_state(RecorderState::Recording);
        }
    }

    /// Stop capture and tear down the pipeline tasks. Idempotent.
    pub fn stop_recording(&mut self) {
        if self.state == RecorderState::Stopped {
            return;
        }
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        if let Some(handle) = self.chunker_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.encode_handle.take() {
            handle.abort();
        }
        self.set_state(RecorderState::Stopped);
    }

    /// Feed a calibrated noise floor into the running classifier.
    pub fn calibrate_vad(&self, noise_floor_db: f32) {
        let _ = self.floor_tx.send(Some(noise_floor_db));
    }

    /// Release recorder resources and close all output streams. Consuming
    /// `self` makes double-dispose unrepresentable.
    pub fn dispose(mut self) {
        self.stop_recording();
        // Dropping self closes every broadcast sender, ending subscribers.
    }

    fn set_state(&mut self, state: RecorderState) {
        self.state = state;
        let _ = self.state_tx.send(state);
        tracing::debug!(?state, "Recorder state changed");
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_encode_task(
    mut encoder: FrameEncoder,
    mut raw_rx: broadcast::Receiver<AudioFrame>,
    encoded_tx: broadcast::Sender<Vec<u8>>,
    vad_tx: broadcast::Sender<VadEvent>,
    mut floor_rx: watch::Receiver<Option<f32>>,
    paused: Arc<AtomicBool>,
    metrics: Option<Arc<PipelineMetrics>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Encode task started");
        loop {
            let frame = match raw_rx.recv().await {
                Ok(frame) => frame,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Encode task lagged, frames dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            if paused.load(Ordering::SeqCst) {
                continue;
            }

            if floor_rx.has_changed().unwrap_or(false) {
                if let Some(floor) = *floor_rx.borrow_and_update() {
                    encoder.calibrate(floor);
                }
            }

            match encoder.process_frame(&frame) {
                Ok(output) => {
                    if let Some(event) = output.event {
                        if let Some(m) = &metrics {
                            m.set_speaking(matches!(event, VadEvent::SpeechStart { .. }));
                            m.mark_stage_active(PipelineStage::Vad);
                        }
                        let _ = vad_tx.send(event);
                    }
                    match output.encoded {
                        Some(bytes) => {
                            if let Some(m) = &metrics {
                                m.frames_encoded
                                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                                m.mark_stage_active(PipelineStage::Encoder);
                            }
                            let _ = encoded_tx.send(bytes);
                        }
                        None => {
                            if let Some(m) = &metrics {
                                m.silence_frames_dropped
                                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("Frame encoding failed: {e}");
                }
            }
        }
        tracing::info!("Encode task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_starts_in_initialized_state() {
        let recorder = Recorder::new(EncoderConfig::default(), None).unwrap();
        assert_eq!(recorder.state(), RecorderState::Initialized);
    }

    #[test]
    fn pause_and_resume_are_noops_when_not_recording() {
        let mut recorder = Recorder::new(EncoderConfig::default(), None).unwrap();
        recorder.pause_recording();
        assert_eq!(recorder.state(), RecorderState::Initialized);
        recorder.resume_recording();
        assert_eq!(recorder.state(), RecorderState::Initialized);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut recorder = Recorder::new(EncoderConfig::default(), None).unwrap();
        recorder.stop_recording();
        assert_eq!(recorder.state(), RecorderState::Stopped);
        recorder.stop_recording();
        assert_eq!(recorder.state(), RecorderState::Stopped);
    }

    #[tokio::test]
    async fn encode_task_gates_and_reports_events() {
        let config = EncoderConfig::default();
        let encoder = FrameEncoder::new(config.clone()).unwrap();
        let (raw_tx, raw_rx) = broadcast::channel::<AudioFrame>(64);
        let (encoded_tx, mut encoded_rx) = broadcast::channel::<Vec<u8>>(64);
        let (vad_tx, mut vad_rx) = broadcast::channel::<VadEvent>(64);
        let (floor_tx, floor_rx) = watch::channel(None);
        let paused = Arc::new(AtomicBool::new(false));

        let handle = spawn_encode_task(
            encoder, raw_rx, encoded_tx, vad_tx, floor_rx, paused, None,
        );

        floor_tx.send(Some(-50.0)).unwrap();

        let amplitude = (10f32.powf(-25.0 / 20.0) * 32768.0) as i16;
        for _ in 0..10 {
            raw_tx
                .send(AudioFrame {
                    samples: vec![amplitude; 320],
                    sample_rate: 16_000,
                    timestamp_ms: 0,
                })
                .unwrap();
        }

        // Speech start should arrive once the debounce window fills
        let event = tokio::time::timeout(std::time::Duration::from_secs(1), vad_rx.recv())
            .await
            .expect("timed out waiting for VAD event")
            .unwrap();
        assert!(matches!(event, VadEvent::SpeechStart { .. }));

        let encoded = tokio::time::timeout(std::time::Duration::from_secs(1), encoded_rx.recv())
            .await
            .expect("timed out waiting for encoded audio")
            .unwrap();
        assert!(!encoded.is_empty());

        handle.abort();
    }
}
