use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use storyvox_telemetry::{PipelineMetrics, PipelineStage};

use crate::backoff::reconnect_delay;
use crate::error::TransportError;
use crate::protocol::{decode_server_message, encode_client_message, ClientMessage, ServerMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base WebSocket endpoint; session id and token are appended at
    /// connect time.
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub idle_timeout: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8080/session".to_string(),
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(60),
            max_reconnect_attempts: 5,
        }
    }
}

/// Why the link went down. Idle timeouts are an expected
/// resource-conservation event, not an error, and never trigger the
/// reconnection path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Manual,
    IdleTimeout,
    Remote,
    TransportError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Idle,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Disconnected(DisconnectReason),
}

/// Point-in-time view of the connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub connected: bool,
    pub reconnecting: bool,
    pub reconnect_attempts: u32,
}

/// Consumer ends of the transport's output streams. Each stream has a
/// single designated consumer (the interaction state machine).
pub struct TransportStreams {
    pub messages: mpsc::Receiver<ServerMessage>,
    /// Synthesized AI response audio chunks.
    pub audio: mpsc::Receiver<Vec<u8>>,
    /// Protocol errors and reconnection progress. Background listeners
    /// never throw; everything lands here.
    pub errors: mpsc::Receiver<TransportError>,
    pub status: watch::Receiver<LinkStatus>,
}

#[derive(Clone)]
struct SessionKey {
    session_id: String,
    token: String,
}

struct Inner {
    config: TransportConfig,
    session: RwLock<Option<SessionKey>>,
    /// Command channel into the writer task; `None` while disconnected.
    writer: RwLock<Option<mpsc::Sender<Message>>>,
    /// Set before any intentional close so the reader can tell it apart
    /// from an unexpected drop.
    intentional: RwLock<Option<DisconnectReason>>,
    attempts: AtomicU32,
    /// Bumped on every (re)connect and disconnect; timer tasks from a
    /// superseded connection observe the change and exit instead of firing
    /// against stale state.
    generation: AtomicU64,
    last_activity: RwLock<Instant>,
    status_tx: watch::Sender<LinkStatus>,
    msg_tx: mpsc::Sender<ServerMessage>,
    audio_tx: mpsc::Sender<Vec<u8>>,
    err_tx: mpsc::Sender<TransportError>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    metrics: RwLock<Option<Arc<PipelineMetrics>>>,
}

/// Message-oriented duplex channel to the backend, multiplexing structured
/// control messages and binary audio over one logical connection per
/// session.
pub struct SessionTransport {
    inner: Arc<Inner>,
}

impl SessionTransport {
    pub fn new(config: TransportConfig) -> (Self, TransportStreams) {
        let (msg_tx, msg_rx) = mpsc::channel(256);
        let (audio_tx, audio_rx) = mpsc::channel(256);
        let (err_tx, err_rx) = mpsc::channel(64);
        let (status_tx, status_rx) = watch::channel(LinkStatus::Idle);

        let inner = Arc::new(Inner {
            config,
            session: RwLock::new(None),
            writer: RwLock::new(None),
            intentional: RwLock::new(None),
            attempts: AtomicU32::new(0),
            generation: AtomicU64::new(0),
            last_activity: RwLock::new(Instant::now()),
            status_tx,
            msg_tx,
            audio_tx,
            err_tx,
            tasks: Mutex::new(Vec::new()),
            metrics: RwLock::new(None),
        });

        (
            Self { inner },
            TransportStreams {
                messages: msg_rx,
                audio: audio_rx,
                errors: err_rx,
                status: status_rx,
            },
        )
    }

    pub fn with_metrics(self, metrics: Arc<PipelineMetrics>) -> Self {
        *self.inner.metrics.write() = Some(metrics);
        self
    }

    pub fn is_connected(&self) -> bool {
        *self.inner.status_tx.borrow() == LinkStatus::Connected
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        let status = *self.inner.status_tx.borrow();
        ConnectionSnapshot {
            connected: status == LinkStatus::Connected,
            reconnecting: matches!(status, LinkStatus::Reconnecting { .. }),
            reconnect_attempts: self.inner.attempts.load(Ordering::SeqCst),
        }
    }

    /// Establish the channel for `(session_id, token)`. Bounded by the
    /// configured connect timeout; on success heartbeat and idle timers
    /// start and the reconnect counter resets to zero.
    pub async fn connect(
        &self,
        session_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<(), TransportError> {
        if self.is_connected() {
            return Err(TransportError::AlreadyConnected);
        }

        *self.inner.session.write() = Some(SessionKey {
            session_id: session_id.into(),
            token: token.into(),
        });
        *self.inner.intentional.write() = None;
        self.inner.attempts.store(0, Ordering::SeqCst);
        let _ = self.inner.status_tx.send(LinkStatus::Connecting);

        match establish(&self.inner).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = self
                    .inner
                    .status_tx
                    .send(LinkStatus::Disconnected(DisconnectReason::TransportError));
                Err(e)
            }
        }
    }

    /// Manual reconnect after exhausted automatic retries. Resets the
    /// attempt counter to zero.
    pub async fn reconnect(&self) -> Result<(), TransportError> {
        if self.is_connected() {
            return Err(TransportError::AlreadyConnected);
        }
        if self.inner.session.read().is_none() {
            return Err(TransportError::NotConnected);
        }
        *self.inner.intentional.write() = None;
        self.inner.attempts.store(0, Ordering::SeqCst);
        let _ = self.inner.status_tx.send(LinkStatus::Connecting);
        match establish(&self.inner).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = self
                    .inner
                    .status_tx
                    .send(LinkStatus::Disconnected(DisconnectReason::TransportError));
                Err(e)
            }
        }
    }

    /// Transmit a control message, stamping a timestamp if absent. Fails
    /// when not connected, without touching any internal counters.
    pub async fn send(&self, message: &ClientMessage) -> Result<(), TransportError> {
        let writer = match (self.is_connected(), self.inner.writer.read().clone()) {
            (true, Some(writer)) => writer,
            _ => return Err(TransportError::NotConnected),
        };

        let text = encode_client_message(message, chrono::Utc::now().timestamp_millis())?;
        writer
            .send(Message::Text(text))
            .await
            .map_err(|_| TransportError::NotConnected)?;

        touch(&self.inner);
        if let Some(m) = self.inner.metrics.read().as_ref() {
            m.record_message_sent();
            m.mark_stage_active(PipelineStage::Transport);
        }
        Ok(())
    }

    /// Transmit one binary frame of encoded speech audio.
    pub async fn send_audio(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        let writer = match (self.is_connected(), self.inner.writer.read().clone()) {
            (true, Some(writer)) => writer,
            _ => return Err(TransportError::NotConnected),
        };

        let len = bytes.len();
        writer
            .send(Message::Binary(bytes))
            .await
            .map_err(|_| TransportError::NotConnected)?;

        touch(&self.inner);
        if let Some(m) = self.inner.metrics.read().as_ref() {
            m.record_audio_sent(len);
        }
        Ok(())
    }

    /// Intentional close: cancels all timers and closes the channel
    /// without triggering reconnection. Queued messages are flushed before
    /// the close frame goes out. Idempotent.
    pub fn disconnect(&self) {
        if self.inner.writer.read().is_none() {
            return;
        }
        begin_disconnect(&self.inner, DisconnectReason::Manual);
    }
}

impl Drop for SessionTransport {
    fn drop(&mut self) {
        if self.inner.writer.read().is_some() {
            begin_disconnect(&self.inner, DisconnectReason::Manual);
        }
        abort_tasks(&self.inner);
    }
}

fn touch(inner: &Inner) {
    *inner.last_activity.write() = Instant::now();
}

/// Tear down the current connection on purpose. The writer task drains its
/// queue and closes the sink; timer tasks observe the generation bump and
/// exit.
fn begin_disconnect(inner: &Arc<Inner>, reason: DisconnectReason) {
    *inner.intentional.write() = Some(reason);
    inner.generation.fetch_add(1, Ordering::SeqCst);
    *inner.writer.write() = None;
    let _ = inner.status_tx.send(LinkStatus::Disconnected(reason));
    tracing::info!(?reason, "Transport disconnected");
}

async fn establish(inner: &Arc<Inner>) -> Result<(), TransportError> {
    let key = inner
        .session
        .read()
        .clone()
        .ok_or(TransportError::NotConnected)?;

    let url = format!(
        "{}/{}?token={}",
        inner.config.endpoint.trim_end_matches('/'),
        key.session_id,
        key.token
    );

    let connect_timeout = inner.config.connect_timeout;
    let (ws, _response) = timeout(connect_timeout, connect_async(&url))
        .await
        .map_err(|_| TransportError::ConnectTimeout(connect_timeout))?
        .map_err(|e| TransportError::WebSocket(e.to_string()))?;

    // Supersede any timers left over from a previous connection before
    // wiring up the new one.
    let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
    abort_tasks(inner);

    let (sink, source) = ws.split();
    let (writer_tx, writer_rx) = mpsc::channel::<Message>(64);
    *inner.writer.write() = Some(writer_tx);
    *inner.intentional.write() = None;
    touch(inner);
    inner.attempts.store(0, Ordering::SeqCst);
    if let Some(m) = inner.metrics.read().as_ref() {
        m.set_reconnect_attempts(0);
    }
    let _ = inner.status_tx.send(LinkStatus::Connected);
    tracing::info!(session_id = %key.session_id, "Transport connected");

    let mut tasks = inner.tasks.lock();
    tasks.push(tokio::spawn(run_writer(sink, writer_rx)));
    tasks.push(tokio::spawn(run_reader(inner.clone(), source)));
    tasks.push(tokio::spawn(run_heartbeat(inner.clone(), generation)));
    tasks.push(tokio::spawn(run_idle_watch(inner.clone(), generation)));

    Ok(())
}

fn abort_tasks(inner: &Inner) {
    for task in inner.tasks.lock().drain(..) {
        task.abort();
    }
}

/// Writer task: owns the sink half. Draining the command channel before
/// closing guarantees that messages queued before an intentional
/// disconnect (e.g. `end_session`) reach the wire first.
async fn run_writer(mut sink: WsSink, mut rx: mpsc::Receiver<Message>) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = sink.send(message).await {
            tracing::warn!("Writer send failed: {e}");
            break;
        }
    }
    let _ = sink.close().await;
}

/// Reader task: classifies incoming frames. Malformed control messages go
/// to the error stream and the connection stays up; an unexpected close
/// hands off to the reconnection path.
async fn run_reader(inner: Arc<Inner>, mut source: WsSource) {
    loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => {
                touch(&inner);
                if let Some(m) = inner.metrics.read().as_ref() {
                    m.record_message_received();
                }
                match decode_server_message(&text) {
                    // Pong only proves liveness; activity was already noted
                    Ok(ServerMessage::Pong) => {}
                    Ok(message) => {
                        if inner.msg_tx.send(message).await.is_err() {
                            tracing::warn!("Message consumer dropped, stopping reader");
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = inner
                            .err_tx
                            .send(TransportError::Protocol(e.to_string()))
                            .await;
                    }
                }
            }
            Some(Ok(Message::Binary(bytes))) => {
                touch(&inner);
                if let Some(m) = inner.metrics.read().as_ref() {
                    m.record_audio_received(bytes.len());
                }
                let _ = inner.audio_tx.send(bytes).await;
            }
            Some(Ok(Message::Ping(payload))) => {
                touch(&inner);
                let writer = inner.writer.read().clone();
                if let Some(writer) = writer {
                    let _ = writer.send(Message::Pong(payload)).await;
                }
            }
            Some(Ok(Message::Pong(_))) => touch(&inner),
            Some(Ok(Message::Close(_))) | None => {
                on_link_down(&inner, DisconnectReason::Remote);
                return;
            }
            Some(Ok(Message::Frame(_))) => {}
            Some(Err(e)) => {
                let _ = inner
                    .err_tx
                    .send(TransportError::WebSocket(e.to_string()))
                    .await;
                on_link_down(&inner, DisconnectReason::TransportError);
                return;
            }
        }
    }
}

/// Reader-side handling when the link drops. Intentional closes were
/// already reported; anything else schedules automatic reconnection.
fn on_link_down(inner: &Arc<Inner>, reason: DisconnectReason) {
    if inner.intentional.read().is_some() {
        return;
    }

    *inner.writer.write() = None;
    inner.generation.fetch_add(1, Ordering::SeqCst);
    tracing::warn!(?reason, "Transport link lost, scheduling reconnect");
    tokio::spawn(auto_reconnect(inner.clone()));
}

async fn auto_reconnect(inner: Arc<Inner>) {
    let max = inner.config.max_reconnect_attempts;
    loop {
        let attempt = inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt > max {
            let _ = inner
                .err_tx
                .send(TransportError::ReconnectExhausted { attempts: max })
                .await;
            let _ = inner
                .status_tx
                .send(LinkStatus::Disconnected(DisconnectReason::TransportError));
            tracing::error!(attempts = max, "Reconnection exhausted, manual reconnect required");
            return;
        }

        let _ = inner.status_tx.send(LinkStatus::Reconnecting { attempt });
        if let Some(m) = inner.metrics.read().as_ref() {
            m.set_reconnect_attempts(attempt as usize);
        }

        sleep(reconnect_delay(attempt)).await;

        // User may have disconnected on purpose while we were waiting
        if inner.intentional.read().is_some() {
            return;
        }

        match establish(&inner).await {
            Ok(()) => {
                tracing::info!(attempt, "Reconnected");
                return;
            }
            Err(e) => {
                let _ = inner
                    .err_tx
                    .send(TransportError::ReconnectFailed {
                        attempt,
                        max,
                        reason: e.to_string(),
                    })
                    .await;
            }
        }
    }
}

/// Heartbeat task: periodic ping keeps intermediaries from reaping the
/// connection and gives the idle watchdog fresh activity on quiet links
/// only when traffic actually flows back.
async fn run_heartbeat(inner: Arc<Inner>, generation: u64) {
    loop {
        sleep(inner.config.heartbeat_interval).await;
        if inner.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        let writer = inner.writer.read().clone();
        let Some(writer) = writer else { return };

        match encode_client_message(&ClientMessage::Ping, chrono::Utc::now().timestamp_millis()) {
            Ok(text) => {
                if writer.send(Message::Text(text)).await.is_err() {
                    return;
                }
                tracing::trace!("Heartbeat ping sent");
            }
            Err(e) => tracing::error!("Failed to encode heartbeat: {e}"),
        }
    }
}

/// Idle watchdog: with no send or receive activity for the configured
/// window, proactively disconnect. This is resource conservation, not an
/// error, so the reconnection path is never taken.
async fn run_idle_watch(inner: Arc<Inner>, generation: u64) {
    loop {
        let idle = inner.config.idle_timeout;
        let elapsed = inner.last_activity.read().elapsed();

        if elapsed >= idle {
            tracing::info!(?idle, "Idle timeout reached, disconnecting");
            begin_disconnect(&inner, DisconnectReason::IdleTimeout);
            return;
        }

        let remaining = idle - elapsed;
        sleep(remaining.min(Duration::from_millis(250)).max(Duration::from_millis(10))).await;
        if inner.generation.load(Ordering::SeqCst) != generation {
            return;
        }
    }
}
