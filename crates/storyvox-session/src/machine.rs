//! The interaction state machine.
//!
//! All `Session` mutation happens here, on a single event-loop consumer of
//! VAD events, transport messages, and UI commands. Producers stay on
//! their own tasks and communicate over channels.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch};

use storyvox_audio::calibrator::NoiseCalibration;
use storyvox_transport::{ClientMessage, ServerMessage, SessionTransport, TransportError};
use storyvox_vad::types::VadEvent;

use crate::error::SessionError;
use crate::playback::PlaybackControl;
use crate::session::{Session, SessionMode, SessionStatus, StoryContext};

/// Transport operations the state machine drives. `SessionTransport`
/// implements this; tests substitute a mock to verify call ordering and
/// counts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionLink: Send + Sync {
    async fn connect(&self, session_id: String, token: String) -> Result<(), TransportError>;
    async fn send(&self, message: ClientMessage) -> Result<(), TransportError>;
    fn disconnect(&self);
    fn is_connected(&self) -> bool;
}

#[async_trait]
impl SessionLink for SessionTransport {
    async fn connect(&self, session_id: String, token: String) -> Result<(), TransportError> {
        SessionTransport::connect(self, session_id, token).await
    }

    async fn send(&self, message: ClientMessage) -> Result<(), TransportError> {
        SessionTransport::send(self, &message).await
    }

    fn disconnect(&self) {
        SessionTransport::disconnect(self);
    }

    fn is_connected(&self) -> bool {
        SessionTransport::is_connected(self)
    }
}

/// Microphone-side operations the state machine drives: the pre-session
/// noise calibration pass and listening start/stop.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceCapture: Send + Sync {
    async fn calibrate(&self) -> Result<NoiseCalibration, SessionError>;
    async fn start_listening(&self) -> Result<(), SessionError>;
    async fn stop_listening(&self);
}

/// Commands from the UI / outer application.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    SwitchMode(SessionMode),
    InterruptAi,
    PauseSession,
    ResumeSession,
    EndSession,
    /// Narration finished playing; the UI may offer an interactive session.
    PlaybackCompleted,
    Shutdown,
}

/// Out-of-band signals for the UI collaborator, separate from session
/// snapshots and errors.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    /// Narration finished; the UI may offer to start an interactive
    /// session.
    PlaybackCompleted { story_id: String },
}

/// Consumer ends of the machine's observable outputs.
pub struct SessionObservers {
    /// Snapshot of the session after every mutation.
    pub session: watch::Receiver<Session>,
    pub errors: mpsc::Receiver<SessionError>,
    pub notices: mpsc::Receiver<SessionNotice>,
}

pub struct InteractionStateMachine {
    session: Session,
    token: String,
    context: StoryContext,
    playback: Arc<dyn PlaybackControl>,
    link: Arc<dyn SessionLink>,
    voice: Arc<dyn VoiceCapture>,
    session_tx: watch::Sender<Session>,
    err_tx: mpsc::Sender<SessionError>,
    notice_tx: mpsc::Sender<SessionNotice>,
}

impl InteractionStateMachine {
    pub fn new(
        session: Session,
        token: impl Into<String>,
        context: StoryContext,
        playback: Arc<dyn PlaybackControl>,
        link: Arc<dyn SessionLink>,
        voice: Arc<dyn VoiceCapture>,
    ) -> (Self, SessionObservers) {
        let (session_tx, session_rx) = watch::channel(session.clone());
        let (err_tx, err_rx) = mpsc::channel(32);
        let (notice_tx, notice_rx) = mpsc::channel(16);
        (
            Self {
                session,
                token: token.into(),
                context,
                playback,
                link,
                voice,
                session_tx,
                err_tx,
                notice_tx,
            },
            SessionObservers {
                session: session_rx,
                errors: err_rx,
                notices: notice_rx,
            },
        )
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn publish(&self) {
        let _ = self.session_tx.send(self.session.clone());
    }

    async fn surface(&mut self, error: SessionError) {
        let recoverable = error.is_recoverable();
        self.session.record_error(error.to_string(), recoverable);
        self.publish();
        if self.err_tx.send(error).await.is_err() {
            tracing::warn!("Session error stream has no consumer");
        }
    }

    /// Fire-and-report transport send; failures land on the error stream
    /// rather than propagating out of event handlers.
    async fn send_or_surface(&mut self, message: ClientMessage) {
        if let Err(e) = self.link.send(message).await {
            self.surface(SessionError::Transport(e)).await;
        }
    }

    /// Switch between passive narration and interactive listening.
    /// Requesting the mode already active is a no-op with zero transport
    /// churn. Network failures complete the mode-flag update and surface
    /// on the error stream; the machine never gets stuck mid-switch.
    pub async fn switch_mode(&mut self, mode: SessionMode) {
        if self.session.mode == mode {
            tracing::debug!(?mode, "Mode already active, ignoring switch");
            return;
        }
        match mode {
            SessionMode::Interactive => self.enter_interactive().await,
            SessionMode::Passive => self.enter_passive().await,
        }
    }

    async fn enter_interactive(&mut self) {
        let prior_status = self.session.status;

        // Playback yields audio focus before the microphone opens
        let was_playing = self.playback.is_playing().await;
        if was_playing {
            self.playback.pause().await;
        }

        self.session.status = SessionStatus::Calibrating;
        self.publish();

        let calibration = match self.voice.calibrate().await {
            Ok(calibration) => {
                if calibration.used_fallback {
                    tracing::warn!(
                        floor_db = calibration.noise_floor_db,
                        "Calibration used fallback noise floor"
                    );
                }
                Some(calibration)
            }
            Err(e) => {
                self.surface(e).await;
                None
            }
        };

        self.session.playback_position_ms = self.playback.position_ms().await;

        let connected = match self
            .link
            .connect(self.session.id.clone(), self.token.clone())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                self.surface(SessionError::Transport(e)).await;
                false
            }
        };

        if connected {
            self.send_or_surface(ClientMessage::SyncPosition {
                position_ms: self.session.playback_position_ms,
            })
            .await;
            self.send_or_surface(ClientMessage::UpdateContext {
                story_id: self.context.story_id.clone(),
                story_title: self.context.story_title.clone(),
                story_synopsis: self.context.story_synopsis.clone(),
                characters: self.context.characters.clone(),
                current_scene: self.context.current_scene.clone(),
            })
            .await;
            self.send_or_surface(ClientMessage::StartListening).await;
        }

        let listening = match self.voice.start_listening().await {
            Ok(()) => true,
            Err(e) => {
                self.surface(e).await;
                false
            }
        };

        // The mode flag always reflects the user's intent, even while the
        // network layer is still settling.
        self.session.mode = SessionMode::Interactive;
        self.session.is_listening = listening;
        self.session.status = if connected && listening {
            SessionStatus::Active
        } else {
            prior_status
        };
        self.publish();

        if was_playing {
            self.playback.resume().await;
        }

        if let Some(calibration) = calibration {
            tracing::info!(
                noise_floor_db = calibration.noise_floor_db,
                samples = calibration.sample_count,
                "Interactive session started"
            );
        }
    }

    async fn enter_passive(&mut self) {
        self.voice.stop_listening().await;

        // Backend is told the session is over before the channel drops
        if self.link.is_connected() {
            self.send_or_surface(ClientMessage::EndSession).await;
        }
        self.link.disconnect();

        self.session.mode = SessionMode::Passive;
        self.session.is_listening = false;
        self.session.child_speaking = false;
        self.session.ai_responding = false;
        // Playback position is preserved untouched across the switch
        self.publish();
    }

    pub async fn handle_vad_event(&mut self, event: VadEvent) {
        match event {
            VadEvent::SpeechStart { timestamp_ms, .. } => {
                tracing::debug!(timestamp_ms, "Child speech started");
                self.session.child_speaking = true;
                self.publish();
                self.send_or_surface(ClientMessage::SpeechStarted).await;
            }
            VadEvent::SpeechEnd {
                timestamp_ms,
                duration_ms,
                ..
            } => {
                tracing::debug!(timestamp_ms, duration_ms, "Child speech ended");
                self.session.child_speaking = false;
                self.publish();
                self.send_or_surface(ClientMessage::SpeechEnded { duration_ms })
                    .await;
            }
        }
    }

    pub async fn handle_server_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::ConnectionEstablished => {
                tracing::info!("Backend acknowledged the session");
            }
            ServerMessage::TranscriptionProgress { text, .. }
            | ServerMessage::TranscriptionFinal { text, .. } => {
                self.session.transcript = text;
                self.publish();
            }
            ServerMessage::AiProcessingStarted => {
                tracing::debug!("Backend is processing the question");
            }
            ServerMessage::AiResponseStarted => {
                self.session.ai_responding = true;
                self.session.ai_response.clear();
                self.publish();
            }
            ServerMessage::AiResponseText { text } => {
                self.session.ai_response.push_str(&text);
                self.publish();
            }
            ServerMessage::AiResponseCompleted { full_text } => {
                self.session.ai_responding = false;
                self.session.ai_response = full_text;
                self.publish();
            }
            ServerMessage::ResumeStory { resume_position } => {
                self.session.playback_position_ms = resume_position;
                self.publish();
                self.playback.seek_to(resume_position).await;
                self.playback.resume().await;
            }
            ServerMessage::SessionStatusChanged { status } => {
                tracing::info!(status, "Backend session status changed");
            }
            ServerMessage::SessionEnded => {
                self.session.status = SessionStatus::Completed;
                self.session.ai_responding = false;
                self.session.child_speaking = false;
                self.publish();
            }
            ServerMessage::Error {
                message,
                recoverable,
            } => {
                self.session.record_error(&message, recoverable);
                self.publish();
                let _ = self.err_tx.send(SessionError::Rejected(message)).await;
            }
            ServerMessage::Pong => {}
            ServerMessage::Unknown => {
                tracing::trace!("Ignoring unknown message type from backend");
            }
        }
    }

    pub async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SwitchMode(mode) => self.switch_mode(mode).await,
            SessionCommand::InterruptAi => {
                self.session.ai_responding = false;
                self.publish();
                self.send_or_surface(ClientMessage::InterruptAi).await;
            }
            SessionCommand::PauseSession => {
                self.session.status = SessionStatus::Paused;
                self.publish();
                self.send_or_surface(ClientMessage::PauseSession).await;
            }
            SessionCommand::ResumeSession => {
                self.session.status = SessionStatus::Active;
                self.publish();
                self.send_or_surface(ClientMessage::ResumeSession).await;
            }
            SessionCommand::EndSession => {
                if self.session.mode == SessionMode::Interactive {
                    self.switch_mode(SessionMode::Passive).await;
                }
                self.session.status = SessionStatus::Completed;
                self.publish();
            }
            SessionCommand::PlaybackCompleted => {
                tracing::info!(
                    story_id = %self.session.story_id,
                    "Story playback completed"
                );
                let notice = SessionNotice::PlaybackCompleted {
                    story_id: self.session.story_id.clone(),
                };
                if self.notice_tx.send(notice).await.is_err() {
                    tracing::warn!("Session notice stream has no consumer");
                }
            }
            SessionCommand::Shutdown => {}
        }
    }

    /// The single-consumer event loop. Runs until a `Shutdown` command or
    /// until every input channel closes.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut vad_events: broadcast::Receiver<VadEvent>,
        mut messages: mpsc::Receiver<ServerMessage>,
        mut transport_errors: mpsc::Receiver<TransportError>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => {
                        tracing::info!("Session event loop shutting down");
                        if self.session.mode == SessionMode::Interactive {
                            self.switch_mode(SessionMode::Passive).await;
                        }
                        return;
                    }
                    Some(command) => self.handle_command(command).await,
                },
                event = vad_events.recv() => match event {
                    Ok(event) => self.handle_vad_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event loop lagged behind VAD events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("VAD event stream closed");
                        return;
                    }
                },
                message = messages.recv() => match message {
                    Some(message) => self.handle_server_message(message).await,
                    None => {
                        tracing::debug!("Transport message stream closed");
                        return;
                    }
                },
                error = transport_errors.recv() => {
                    if let Some(error) = error {
                        self.surface(SessionError::Transport(error)).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::MockPlaybackControl;
    use mockall::predicate;
    use mockall::Sequence;

    fn quiet_calibration() -> NoiseCalibration {
        NoiseCalibration {
            noise_floor_db: -50.0,
            sample_count: 10,
            p90_db: -45.0,
            duration_ms: 1000,
            used_fallback: false,
        }
    }

    fn machine_with(
        mode: SessionMode,
        playback: MockPlaybackControl,
        link: MockSessionLink,
        voice: MockVoiceCapture,
    ) -> (InteractionStateMachine, SessionObservers) {
        let mut session = Session::new("session-1", "story-1");
        session.mode = mode;
        let context = StoryContext {
            story_id: "story-1".into(),
            story_title: "The Fox and the Star".into(),
            ..Default::default()
        };
        InteractionStateMachine::new(
            session,
            "token",
            context,
            Arc::new(playback),
            Arc::new(link),
            Arc::new(voice),
        )
    }

    #[tokio::test]
    async fn same_mode_switch_is_a_noop() {
        let playback = MockPlaybackControl::new();
        let mut link = MockSessionLink::new();
        link.expect_connect().times(0);
        link.expect_disconnect().times(0);
        link.expect_send().times(0);
        let voice = MockVoiceCapture::new();

        let (mut machine, _obs) = machine_with(SessionMode::Passive, playback, link, voice);
        machine.switch_mode(SessionMode::Passive).await;
        assert_eq!(machine.session().mode, SessionMode::Passive);
    }

    #[tokio::test]
    async fn interactive_switch_pauses_before_calibration_and_resumes_after() {
        let mut seq = Sequence::new();
        let mut playback = MockPlaybackControl::new();
        let mut link = MockSessionLink::new();
        let mut voice = MockVoiceCapture::new();

        playback.expect_is_playing().return_const(true);
        playback
            .expect_pause()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        voice
            .expect_calibrate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(quiet_calibration()));
        playback.expect_position_ms().return_const(42_000u64);
        link.expect_connect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        link.expect_send().returning(|_| Ok(()));
        voice.expect_start_listening().returning(|| Ok(()));
        playback
            .expect_resume()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let (mut machine, _obs) =
            machine_with(SessionMode::Passive, playback, link, voice);
        machine.switch_mode(SessionMode::Interactive).await;

        let session = machine.session();
        assert_eq!(session.mode, SessionMode::Interactive);
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.is_listening);
        assert_eq!(session.playback_position_ms, 42_000);
    }

    #[tokio::test]
    async fn interactive_switch_syncs_position_and_context() {
        let mut playback = MockPlaybackControl::new();
        playback.expect_is_playing().return_const(false);
        playback.expect_position_ms().return_const(7_500u64);

        let mut link = MockSessionLink::new();
        link.expect_connect().returning(|_, _| Ok(()));
        link.expect_send()
            .with(predicate::eq(ClientMessage::SyncPosition {
                position_ms: 7_500,
            }))
            .times(1)
            .returning(|_| Ok(()));
        link.expect_send()
            .withf(|m| matches!(m, ClientMessage::UpdateContext { story_id, .. } if story_id == "story-1"))
            .times(1)
            .returning(|_| Ok(()));
        link.expect_send()
            .with(predicate::eq(ClientMessage::StartListening))
            .times(1)
            .returning(|_| Ok(()));

        let mut voice = MockVoiceCapture::new();
        voice.expect_calibrate().returning(|| Ok(quiet_calibration()));
        voice.expect_start_listening().returning(|| Ok(()));

        let (mut machine, _obs) =
            machine_with(SessionMode::Passive, playback, link, voice);
        machine.switch_mode(SessionMode::Interactive).await;
    }

    #[tokio::test]
    async fn passive_switch_sends_end_session_before_disconnect() {
        let mut seq = Sequence::new();
        let playback = MockPlaybackControl::new();

        let mut voice = MockVoiceCapture::new();
        voice
            .expect_stop_listening()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let mut link = MockSessionLink::new();
        link.expect_is_connected().return_const(true);
        link.expect_send()
            .with(predicate::eq(ClientMessage::EndSession))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        link.expect_disconnect()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let (mut machine, _obs) =
            machine_with(SessionMode::Interactive, playback, link, voice);
        machine.session.child_speaking = true;
        machine.session.ai_responding = true;

        machine.switch_mode(SessionMode::Passive).await;

        let session = machine.session();
        assert_eq!(session.mode, SessionMode::Passive);
        assert!(!session.child_speaking);
        assert!(!session.ai_responding);
        assert!(!session.is_listening);
    }

    #[tokio::test]
    async fn passive_switch_preserves_playback_position() {
        let playback = MockPlaybackControl::new();
        let mut voice = MockVoiceCapture::new();
        voice.expect_stop_listening().return_const(());
        let mut link = MockSessionLink::new();
        link.expect_is_connected().return_const(false);
        link.expect_send().times(0);
        link.expect_disconnect().return_const(());

        let (mut machine, _obs) =
            machine_with(SessionMode::Interactive, playback, link, voice);
        machine.session.playback_position_ms = 123_456;

        machine.switch_mode(SessionMode::Passive).await;
        assert_eq!(machine.session().playback_position_ms, 123_456);
    }

    #[tokio::test]
    async fn connect_failure_still_updates_mode_and_surfaces_error() {
        let mut playback = MockPlaybackControl::new();
        playback.expect_is_playing().return_const(false);
        playback.expect_position_ms().return_const(0u64);

        let mut voice = MockVoiceCapture::new();
        voice.expect_calibrate().returning(|| Ok(quiet_calibration()));
        voice.expect_start_listening().returning(|| Ok(()));

        let mut link = MockSessionLink::new();
        link.expect_connect()
            .returning(|_, _| Err(TransportError::ConnectTimeout(std::time::Duration::from_secs(10))));
        link.expect_send().times(0);

        let (mut machine, mut obs) =
            machine_with(SessionMode::Passive, playback, link, voice);
        machine.switch_mode(SessionMode::Interactive).await;

        // Mode flag reflects intent even though the network failed
        assert_eq!(machine.session().mode, SessionMode::Interactive);
        assert_ne!(machine.session().status, SessionStatus::Calibrating);

        let err = obs.errors.recv().await.unwrap();
        assert!(matches!(
            err,
            SessionError::Transport(TransportError::ConnectTimeout(_))
        ));
        assert!(machine.session().last_error.is_some());
    }

    #[tokio::test]
    async fn speech_events_set_flag_and_notify_backend() {
        let playback = MockPlaybackControl::new();
        let voice = MockVoiceCapture::new();
        let mut link = MockSessionLink::new();
        link.expect_send()
            .with(predicate::eq(ClientMessage::SpeechStarted))
            .times(1)
            .returning(|_| Ok(()));
        link.expect_send()
            .with(predicate::eq(ClientMessage::SpeechEnded { duration_ms: 640 }))
            .times(1)
            .returning(|_| Ok(()));

        let (mut machine, _obs) =
            machine_with(SessionMode::Interactive, playback, link, voice);

        machine
            .handle_vad_event(VadEvent::SpeechStart {
                timestamp_ms: 100,
                energy_db: -25.0,
            })
            .await;
        assert!(machine.session().child_speaking);

        machine
            .handle_vad_event(VadEvent::SpeechEnd {
                timestamp_ms: 740,
                duration_ms: 640,
                energy_db: -52.0,
            })
            .await;
        assert!(!machine.session().child_speaking);
    }

    #[tokio::test]
    async fn ai_response_accumulates_and_completes() {
        let playback = MockPlaybackControl::new();
        let voice = MockVoiceCapture::new();
        let link = MockSessionLink::new();

        let (mut machine, _obs) =
            machine_with(SessionMode::Interactive, playback, link, voice);

        machine
            .handle_server_message(ServerMessage::AiResponseStarted)
            .await;
        assert!(machine.session().ai_responding);

        machine
            .handle_server_message(ServerMessage::AiResponseText {
                text: "Once upon ".into(),
            })
            .await;
        machine
            .handle_server_message(ServerMessage::AiResponseText {
                text: "a time".into(),
            })
            .await;
        assert_eq!(machine.session().ai_response, "Once upon a time");

        machine
            .handle_server_message(ServerMessage::AiResponseCompleted {
                full_text: "Once upon a time.".into(),
            })
            .await;
        assert!(!machine.session().ai_responding);
        assert_eq!(machine.session().ai_response, "Once upon a time.");
    }

    #[tokio::test]
    async fn resume_story_seeks_and_resumes_playback() {
        let mut playback = MockPlaybackControl::new();
        let mut seq = Sequence::new();
        playback
            .expect_seek_to()
            .with(predicate::eq(84_000u64))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        playback
            .expect_resume()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let voice = MockVoiceCapture::new();
        let link = MockSessionLink::new();
        let (mut machine, _obs) =
            machine_with(SessionMode::Interactive, playback, link, voice);

        machine
            .handle_server_message(ServerMessage::ResumeStory {
                resume_position: 84_000,
            })
            .await;
        assert_eq!(machine.session().playback_position_ms, 84_000);
    }

    #[tokio::test]
    async fn recoverable_backend_error_keeps_status() {
        let playback = MockPlaybackControl::new();
        let voice = MockVoiceCapture::new();
        let link = MockSessionLink::new();
        let (mut machine, mut obs) =
            machine_with(SessionMode::Interactive, playback, link, voice);
        machine.session.status = SessionStatus::Active;

        machine
            .handle_server_message(ServerMessage::Error {
                message: "try again".into(),
                recoverable: true,
            })
            .await;
        assert_eq!(machine.session().status, SessionStatus::Active);
        assert!(matches!(
            obs.errors.recv().await,
            Some(SessionError::Rejected(_))
        ));

        machine
            .handle_server_message(ServerMessage::Error {
                message: "session expired".into(),
                recoverable: false,
            })
            .await;
        assert_eq!(machine.session().status, SessionStatus::Error);
    }

    #[tokio::test]
    async fn playback_completed_surfaces_a_notice() {
        let playback = MockPlaybackControl::new();
        let voice = MockVoiceCapture::new();
        let mut link = MockSessionLink::new();
        link.expect_send().times(0);

        let (mut machine, mut obs) =
            machine_with(SessionMode::Passive, playback, link, voice);

        machine.handle_command(SessionCommand::PlaybackCompleted).await;
        assert_eq!(
            obs.notices.recv().await,
            Some(SessionNotice::PlaybackCompleted {
                story_id: "story-1".into()
            })
        );
        // The completion signal alone changes nothing about the session
        assert_eq!(machine.session().mode, SessionMode::Passive);
    }

    #[tokio::test]
    async fn session_ended_completes_the_session() {
        let playback = MockPlaybackControl::new();
        let voice = MockVoiceCapture::new();
        let link = MockSessionLink::new();
        let (mut machine, _obs) =
            machine_with(SessionMode::Interactive, playback, link, voice);
        machine.session.ai_responding = true;

        machine.handle_server_message(ServerMessage::SessionEnded).await;
        assert_eq!(machine.session().status, SessionStatus::Completed);
        assert!(!machine.session().ai_responding);
    }
}
