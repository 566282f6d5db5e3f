use tokio::sync::broadcast;
use tokio::time::{timeout, Duration, Instant};

use super::chunker::AudioFrame;
use storyvox_vad::energy;

#[derive(Debug, Clone, Copy)]
pub struct CalibrationConfig {
    /// Total bounded sampling window.
    pub duration_ms: u64,
    /// One energy reading is taken per interval.
    pub sample_interval_ms: u64,
    /// Floor used when no audio arrives during the window (e.g. the
    /// microphone could not be acquired). Calibration degrades, it never
    /// blocks the session.
    pub fallback_floor_db: f32,
    /// Floors above this are flagged as a noisy environment (advisory,
    /// non-blocking).
    pub noisy_floor_db: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            duration_ms: 1000,
            sample_interval_ms: 100,
            fallback_floor_db: -40.0,
            noisy_floor_db: -35.0,
        }
    }
}

/// Result of one pre-session ambient sampling pass. Immutable once
/// produced; the mean becomes the classifier's noise floor, the rest is
/// kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseCalibration {
    pub noise_floor_db: f32,
    pub sample_count: usize,
    pub p90_db: f32,
    pub duration_ms: u64,
    pub used_fallback: bool,
}

impl NoiseCalibration {
    pub fn is_noisy(&self, config: &CalibrationConfig) -> bool {
        self.noise_floor_db > config.noisy_floor_db
    }
}

/// Samples ambient energy for a bounded window before an interactive
/// session starts.
pub struct NoiseCalibrator {
    config: CalibrationConfig,
}

impl NoiseCalibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    /// Run the bounded sampling pass against a live frame stream. Always
    /// completes within roughly `duration_ms`; an empty window degrades to
    /// the configured fallback floor with a warning.
    pub async fn calibrate(&self, frames: &mut broadcast::Receiver<AudioFrame>) -> NoiseCalibration {
        let started = Instant::now();
        let deadline = started + Duration::from_millis(self.config.duration_ms);
        let interval = Duration::from_millis(self.config.sample_interval_ms);
        let mut energies: Vec<f32> = Vec::new();

        while Instant::now() < deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let wait = remaining.min(interval);

            match timeout(wait, frames.recv()).await {
                Ok(Ok(frame)) => {
                    energies.push(energy::calculate_dbfs(&frame.samples));
                }
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    tracing::debug!(skipped, "Calibration lagged behind frame stream");
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => break,
                Err(_) => {} // no frame this interval
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;

        if energies.is_empty() {
            tracing::warn!(
                fallback_db = self.config.fallback_floor_db,
                "No audio during calibration window, using fallback noise floor"
            );
            return NoiseCalibration {
                noise_floor_db: self.config.fallback_floor_db,
                sample_count: 0,
                p90_db: self.config.fallback_floor_db,
                duration_ms: elapsed_ms,
                used_fallback: true,
            };
        }

        let mean = energies.iter().sum::<f32>() / energies.len() as f32;
        let p90 = percentile(&mut energies, 0.90);

        tracing::info!(
            noise_floor_db = mean,
            p90_db = p90,
            samples = energies.len(),
            "Noise calibration complete"
        );

        NoiseCalibration {
            noise_floor_db: mean,
            sample_count: energies.len(),
            p90_db: p90,
            duration_ms: elapsed_ms,
            used_fallback: false,
        }
    }
}

fn percentile(values: &mut [f32], q: f32) -> f32 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = ((values.len() - 1) as f32 * q).round() as usize;
    values[idx]
}
