use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};

use super::frame_reader::{FrameReader, RawChunk};
use storyvox_telemetry::{FpsTracker, PipelineMetrics, PipelineStage};

/// A fixed-duration slice of mono PCM, the atomic unit for VAD and
/// encoding. Every frame carries exactly `sample_rate * frame_ms / 1000`
/// samples; trailing partials stay buffered in the chunker.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    /// Stream time of the first sample, derived from the emitted-sample
    /// count (monotonic, not wall-clock).
    pub timestamp_ms: u64,
}

pub struct ChunkerConfig {
    pub frame_size_samples: usize,
    pub sample_rate_hz: u32,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            frame_size_samples: 320,
            sample_rate_hz: 16_000,
        }
    }
}

/// Bridges variable-sized capture chunks into the fixed-frame world.
pub struct FrameChunker {
    frame_reader: FrameReader,
    output_tx: broadcast::Sender<AudioFrame>,
    cfg: ChunkerConfig,
    running: Arc<AtomicBool>,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl FrameChunker {
    pub fn new(
        frame_reader: FrameReader,
        output_tx: broadcast::Sender<AudioFrame>,
        cfg: ChunkerConfig,
    ) -> Self {
        Self {
            frame_reader,
            output_tx,
            cfg,
            running: Arc::new(AtomicBool::new(false)),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        let mut worker = ChunkerWorker::new(self.frame_reader, self.output_tx, self.cfg, self.metrics);
        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();

        tokio::spawn(async move {
            worker.run(running).await;
        })
    }
}

struct ChunkerWorker {
    frame_reader: FrameReader,
    output_tx: broadcast::Sender<AudioFrame>,
    cfg: ChunkerConfig,
    buffer: VecDeque<i16>,
    samples_emitted: u64,
    metrics: Option<Arc<PipelineMetrics>>,
    capture_fps: FpsTracker,
    chunker_fps: FpsTracker,
}

impl ChunkerWorker {
    fn new(
        frame_reader: FrameReader,
        output_tx: broadcast::Sender<AudioFrame>,
        cfg: ChunkerConfig,
        metrics: Option<Arc<PipelineMetrics>>,
    ) -> Self {
        let cap = cfg.frame_size_samples * 4;
        Self {
            frame_reader,
            output_tx,
            cfg,
            buffer: VecDeque::with_capacity(cap),
            samples_emitted: 0,
            metrics,
            capture_fps: FpsTracker::new(),
            chunker_fps: FpsTracker::new(),
        }
    }

    async fn run(&mut self, running: Arc<AtomicBool>) {
        tracing::info!("Frame chunker started");

        while running.load(Ordering::SeqCst) {
            if let Some(chunk) = self.frame_reader.read_chunk(4096) {
                if let Some(m) = &self.metrics {
                    m.increment_capture_frames();
                    if let Some(fps) = self.capture_fps.tick() {
                        m.update_capture_fps(fps);
                    }
                    m.update_audio_level(&chunk.samples);
                    m.mark_stage_active(PipelineStage::Capture);
                }

                let mono = downmix(&chunk);
                self.buffer.extend(mono);
                self.flush_ready_frames();
            } else {
                // 20ms frames at 16kHz arrive every 20ms; polling at 10ms
                // checks twice per frame period without burning CPU.
                time::sleep(Duration::from_millis(10)).await;
            }
        }

        tracing::info!("Frame chunker stopped");
    }

    fn flush_ready_frames(&mut self) {
        let fs = self.cfg.frame_size_samples;
        while self.buffer.len() >= fs {
            let samples: Vec<i16> = self.buffer.drain(..fs).collect();

            let timestamp_ms =
                (self.samples_emitted as u128 * 1000 / self.cfg.sample_rate_hz as u128) as u64;

            let frame = AudioFrame {
                samples,
                sample_rate: self.cfg.sample_rate_hz,
                timestamp_ms,
            };

            // A broadcast send fails only when no one is subscribed, which
            // is not an error for the pipeline.
            if self.output_tx.send(frame).is_err() {
                tracing::trace!("No active listeners for audio frames");
            }

            self.samples_emitted += fs as u64;

            if let Some(m) = &self.metrics {
                m.increment_chunker_frames();
                if let Some(fps) = self.chunker_fps.tick() {
                    m.update_chunker_fps(fps);
                }
                m.mark_stage_active(PipelineStage::Chunker);
            }
        }
    }
}

/// Average interleaved channels down to mono.
fn downmix(chunk: &RawChunk) -> Vec<i16> {
    if chunk.channels <= 1 {
        return chunk.samples.clone();
    }
    let channels = chunk.channels as usize;
    chunk
        .samples
        .chunks_exact(channels)
        .map(|interleaved| {
            let sum: i32 = interleaved.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}
