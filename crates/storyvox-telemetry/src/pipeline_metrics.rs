use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI16, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Pipeline stages, in data-flow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Capture,
    Chunker,
    Vad,
    Encoder,
    Transport,
}

/// Shared metrics for cross-thread pipeline monitoring.
///
/// Every field is an `Arc<Atomic*>` so the struct can be cloned freely into
/// each stage without locking on the hot path.
#[derive(Clone)]
pub struct PipelineMetrics {
    // Audio level monitoring
    pub current_peak: Arc<AtomicI16>,   // Peak sample value in current window
    pub audio_level_db: Arc<AtomicI16>, // Current level in dB * 10

    // Pipeline stage tracking
    pub stage_capture: Arc<AtomicBool>,
    pub stage_chunker: Arc<AtomicBool>,
    pub stage_vad: Arc<AtomicBool>,
    pub stage_encoder: Arc<AtomicBool>,
    pub stage_transport: Arc<AtomicBool>,

    // Frame rate tracking (frames per second * 10)
    pub capture_fps: Arc<AtomicU64>,
    pub chunker_fps: Arc<AtomicU64>,
    pub vad_fps: Arc<AtomicU64>,

    // Event counters
    pub capture_frames: Arc<AtomicU64>,
    pub chunker_frames: Arc<AtomicU64>,
    pub frames_encoded: Arc<AtomicU64>,
    pub silence_frames_dropped: Arc<AtomicU64>,

    // Activity indicators
    pub is_speaking: Arc<AtomicBool>,
    pub last_speech_time: Arc<RwLock<Option<Instant>>>,
    pub speech_segments_count: Arc<AtomicU64>,

    // Transport counters
    pub messages_sent: Arc<AtomicU64>,
    pub messages_received: Arc<AtomicU64>,
    pub audio_bytes_sent: Arc<AtomicU64>,
    pub audio_bytes_received: Arc<AtomicU64>,
    pub reconnect_attempts: Arc<AtomicUsize>,

    // Error tracking
    pub capture_errors: Arc<AtomicU64>,
    pub chunker_errors: Arc<AtomicU64>,
    pub transport_errors: Arc<AtomicU64>,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self {
            current_peak: Arc::new(AtomicI16::new(0)),
            audio_level_db: Arc::new(AtomicI16::new(-900)),

            stage_capture: Arc::new(AtomicBool::new(false)),
            stage_chunker: Arc::new(AtomicBool::new(false)),
            stage_vad: Arc::new(AtomicBool::new(false)),
            stage_encoder: Arc::new(AtomicBool::new(false)),
            stage_transport: Arc::new(AtomicBool::new(false)),

            capture_fps: Arc::new(AtomicU64::new(0)),
            chunker_fps: Arc::new(AtomicU64::new(0)),
            vad_fps: Arc::new(AtomicU64::new(0)),

            capture_frames: Arc::new(AtomicU64::new(0)),
            chunker_frames: Arc::new(AtomicU64::new(0)),
            frames_encoded: Arc::new(AtomicU64::new(0)),
            silence_frames_dropped: Arc::new(AtomicU64::new(0)),

            is_speaking: Arc::new(AtomicBool::new(false)),
            last_speech_time: Arc::new(RwLock::new(None)),
            speech_segments_count: Arc::new(AtomicU64::new(0)),

            messages_sent: Arc::new(AtomicU64::new(0)),
            messages_received: Arc::new(AtomicU64::new(0)),
            audio_bytes_sent: Arc::new(AtomicU64::new(0)),
            audio_bytes_received: Arc::new(AtomicU64::new(0)),
            reconnect_attempts: Arc::new(AtomicUsize::new(0)),

            capture_errors: Arc::new(AtomicU64::new(0)),
            chunker_errors: Arc::new(AtomicU64::new(0)),
            transport_errors: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_stage_active(&self, stage: PipelineStage) {
        let flag = match stage {
            PipelineStage::Capture => &self.stage_capture,
            PipelineStage::Chunker => &self.stage_chunker,
            PipelineStage::Vad => &self.stage_vad,
            PipelineStage::Encoder => &self.stage_encoder,
            PipelineStage::Transport => &self.stage_transport,
        };
        flag.store(true, Ordering::Relaxed);
    }

    pub fn increment_capture_frames(&self) {
        self.capture_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_chunker_frames(&self) {
        self.chunker_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_capture_fps(&self, fps: f64) {
        self.capture_fps
            .store((fps * 10.0) as u64, Ordering::Relaxed);
    }

    pub fn update_chunker_fps(&self, fps: f64) {
        self.chunker_fps
            .store((fps * 10.0) as u64, Ordering::Relaxed);
    }

    pub fn update_vad_fps(&self, fps: f64) {
        self.vad_fps.store((fps * 10.0) as u64, Ordering::Relaxed);
    }

    /// Update peak and dB level from a raw sample window.
    pub fn update_audio_level(&self, samples: &[i16]) {
        if samples.is_empty() {
            return;
        }
        let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
        self.current_peak.store(peak as i16, Ordering::Relaxed);

        let sum_squares: i64 = samples.iter().map(|&s| s as i64 * s as i64).sum();
        let rms = ((sum_squares as f64 / samples.len() as f64).sqrt()) / 32768.0;
        let db = if rms <= 1e-10 {
            -100.0
        } else {
            20.0 * rms.log10()
        };
        self.audio_level_db
            .store((db * 10.0) as i16, Ordering::Relaxed);
    }

    pub fn set_speaking(&self, speaking: bool) {
        self.is_speaking.store(speaking, Ordering::Relaxed);
        if speaking {
            *self.last_speech_time.write() = Some(Instant::now());
            self.speech_segments_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audio_sent(&self, bytes: usize) {
        self.audio_bytes_sent
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_audio_received(&self, bytes: usize) {
        self.audio_bytes_received
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn set_reconnect_attempts(&self, attempts: usize) {
        self.reconnect_attempts.store(attempts, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_level_tracks_peak_and_db() {
        let metrics = PipelineMetrics::new();

        metrics.update_audio_level(&[0i16; 320]);
        assert_eq!(metrics.audio_level_db.load(Ordering::Relaxed), -1000);

        let full_scale = vec![32767i16; 320];
        metrics.update_audio_level(&full_scale);
        assert_eq!(metrics.current_peak.load(Ordering::Relaxed), 32767);
        // Full scale is ~0 dBFS (stored as dB * 10)
        assert!(metrics.audio_level_db.load(Ordering::Relaxed) > -10);
    }

    #[test]
    fn speaking_transitions_count_segments() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.speech_segments_count.load(Ordering::Relaxed), 0);

        metrics.set_speaking(true);
        metrics.set_speaking(false);
        metrics.set_speaking(true);

        assert_eq!(metrics.speech_segments_count.load(Ordering::Relaxed), 2);
        assert!(metrics.last_speech_time.read().is_some());
    }

    #[test]
    fn stage_flags_start_inactive() {
        let metrics = PipelineMetrics::new();
        assert!(!metrics.stage_capture.load(Ordering::Relaxed));
        metrics.mark_stage_active(PipelineStage::Transport);
        assert!(metrics.stage_transport.load(Ordering::Relaxed));
        assert!(!metrics.stage_vad.load(Ordering::Relaxed));
    }
}
