//! Runtime wiring: capture → chunker → classifier/encoder → transport →
//! interaction state machine, plus graceful shutdown.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::signal;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use storyvox_audio::{CalibrationConfig, NoiseCalibration, NoiseCalibrator, Recorder, RecorderState};
use storyvox_session::{
    InteractionStateMachine, PlaybackControl, Session, SessionCommand, SessionError, SessionLink,
    SessionNotice, StoryContext, VoiceCapture,
};
use storyvox_telemetry::PipelineMetrics;
use storyvox_transport::{LinkStatus, SessionTransport};

use crate::config::Settings;

/// Minimal in-process playback collaborator. Real narration playback is an
/// external component; this stands in for it so the state machine has a
/// position source and an audio-focus counterpart to drive.
pub struct LocalPlayback {
    state: parking_lot::Mutex<PlaybackState>,
}

struct PlaybackState {
    position_ms: u64,
    playing: bool,
}

impl LocalPlayback {
    pub fn new() -> Self {
        Self {
            state: parking_lot::Mutex::new(PlaybackState {
                position_ms: 0,
                playing: false,
            }),
        }
    }
}

impl Default for LocalPlayback {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlaybackControl for LocalPlayback {
    async fn pause(&self) {
        self.state.lock().playing = false;
        info!("Playback paused");
    }

    async fn resume(&self) {
        self.state.lock().playing = true;
        info!("Playback resumed");
    }

    async fn seek_to(&self, position_ms: u64) {
        self.state.lock().position_ms = position_ms;
        info!(position_ms, "Playback seek");
    }

    async fn position_ms(&self) -> u64 {
        self.state.lock().position_ms
    }

    async fn is_playing(&self) -> bool {
        self.state.lock().playing
    }
}

/// Bridges the recorder into the state machine's microphone-side contract:
/// the calibration pass samples the recorder's raw frame stream, and
/// listening start/stop map onto recorder lifecycle transitions.
struct RecorderVoice {
    recorder: Arc<Mutex<Recorder>>,
    calibration: CalibrationConfig,
}

#[async_trait]
impl VoiceCapture for RecorderVoice {
    async fn calibrate(&self) -> Result<NoiseCalibration, SessionError> {
        let mut frames = {
            let mut recorder = self.recorder.lock().await;
            // The microphone must be live for ambient sampling
            if matches!(
                recorder.state(),
                RecorderState::Initialized | RecorderState::Stopped
            ) {
                recorder.start_recording()?;
            }
            recorder.raw_frames()
        };

        let calibrator = NoiseCalibrator::new(self.calibration);
        let result = calibrator.calibrate(&mut frames).await;

        if result.is_noisy(&self.calibration) {
            warn!(
                noise_floor_db = result.noise_floor_db,
                "Noisy environment detected during calibration"
            );
        }

        self.recorder
            .lock()
            .await
            .calibrate_vad(result.noise_floor_db);
        Ok(result)
    }

    async fn start_listening(&self) -> Result<(), SessionError> {
        let mut recorder = self.recorder.lock().await;
        match recorder.state() {
            RecorderState::Recording => {}
            RecorderState::Paused => recorder.resume_recording(),
            RecorderState::Initialized | RecorderState::Stopped => recorder.start_recording()?,
        }
        Ok(())
    }

    async fn stop_listening(&self) {
        self.recorder.lock().await.stop_recording();
    }
}

/// Handle to the running pipeline.
pub struct AppHandle {
    pub metrics: Arc<PipelineMetrics>,
    pub commands: mpsc::Sender<SessionCommand>,
    pub session: watch::Receiver<Session>,
    pub session_errors: mpsc::Receiver<SessionError>,
    pub session_notices: mpsc::Receiver<SessionNotice>,
    /// Synthesized AI response audio from the backend.
    pub ai_audio: mpsc::Receiver<Vec<u8>>,
    pub link_status: watch::Receiver<LinkStatus>,

    recorder: Arc<Mutex<Recorder>>,
    machine_handle: JoinHandle<()>,
    audio_pump_handle: JoinHandle<()>,
}

impl AppHandle {
    /// Gracefully stop the pipeline: the state machine drops back to
    /// passive (ending any open session first), then the microphone stops.
    pub async fn shutdown(self) {
        info!("Shutting down StoryVox runtime...");

        let _ = self.commands.send(SessionCommand::Shutdown).await;
        let _ = self.machine_handle.await;

        self.audio_pump_handle.abort();
        let _ = self.audio_pump_handle.await;

        self.recorder.lock().await.stop_recording();
        info!("StoryVox runtime shutdown complete");
    }

    /// Wait for SIGINT (Ctrl+C).
    pub async fn wait_for_shutdown_signal() {
        info!("Waiting for shutdown signal (Ctrl+C)...");
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, initiating graceful shutdown"),
            Err(err) => error!("Failed to listen for SIGINT: {}", err),
        }
    }
}

/// Start the StoryVox pipeline.
pub async fn start(
    settings: Settings,
    session: Session,
    token: String,
    context: StoryContext,
) -> anyhow::Result<AppHandle> {
    let metrics = Arc::new(PipelineMetrics::default());

    // 1) Recorder: capture thread + chunker + classifier/encoder
    let recorder = Recorder::new(settings.encoder_config(), settings.device.clone())?
        .with_metrics(metrics.clone());
    let vad_events = recorder.vad_events();
    let encoded_audio = recorder.encoded_audio();
    let recorder = Arc::new(Mutex::new(recorder));

    // 2) Transport
    let (transport, streams) =
        SessionTransport::new(settings.transport_config());
    let transport = Arc::new(transport.with_metrics(metrics.clone()));

    // 3) Interaction state machine
    let playback = Arc::new(LocalPlayback::new());
    let voice = Arc::new(RecorderVoice {
        recorder: recorder.clone(),
        calibration: settings.calibration_config(),
    });
    let link: Arc<dyn SessionLink> = transport.clone();
    let (machine, observers) = InteractionStateMachine::new(
        session,
        token,
        context,
        playback,
        link,
        voice,
    );

    let (commands, command_rx) = mpsc::channel(32);
    let machine_handle = tokio::spawn(machine.run(
        command_rx,
        vad_events,
        streams.messages,
        streams.errors,
    ));

    // 4) Pump encoded speech frames to the backend while connected
    let audio_pump_handle = spawn_audio_pump(encoded_audio, transport.clone());

    info!("StoryVox runtime started");

    Ok(AppHandle {
        metrics,
        commands,
        session: observers.session,
        session_errors: observers.errors,
        session_notices: observers.notices,
        ai_audio: streams.audio,
        link_status: streams.status,
        recorder,
        machine_handle,
        audio_pump_handle,
    })
}

fn spawn_audio_pump(
    mut encoded: broadcast::Receiver<Vec<u8>>,
    transport: Arc<SessionTransport>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match encoded.recv().await {
                Ok(bytes) => {
                    if !transport.is_connected() {
                        continue;
                    }
                    if let Err(e) = transport.send_audio(bytes).await {
                        warn!("Failed to forward audio frame: {e}");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Audio pump lagged, encoded frames dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        info!("Audio pump stopped");
    })
}
