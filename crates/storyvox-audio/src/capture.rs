use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::ring_buffer::AudioProducer;
use storyvox_foundation::{AudioConfig, AudioError};

/// The microphone is a single exclusive-access resource; a second capture
/// start while one is active is an error, not a queue.
static CAPTURE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Actual device configuration the stream was opened with.
#[derive(Debug, Clone, Copy)]
pub struct DeviceConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Handle to the dedicated capture thread. The cpal `Stream` is not `Send`,
/// so it lives entirely on that thread; this handle only signals shutdown.
pub struct CaptureThread {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    pub frames_captured: Arc<AtomicU64>,
}

impl CaptureThread {
    /// Open the requested device at the pipeline sample rate and start
    /// feeding the ring buffer. Fails synchronously with a typed error:
    /// permission denial is reported as `AudioError::PermissionDenied`,
    /// distinct from a missing device.
    pub fn spawn(
        config: AudioConfig,
        mut producer: AudioProducer,
        device_name: Option<String>,
    ) -> Result<(Self, DeviceConfig), AudioError> {
        if CAPTURE_ACTIVE.swap(true, Ordering::SeqCst) {
            return Err(AudioError::CaptureAlreadyRunning);
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = shutdown.clone();
        let frames_captured = Arc::new(AtomicU64::new(0));
        let frames_counter = frames_captured.clone();

        let (startup_tx, startup_rx) =
            crossbeam_channel::bounded::<Result<DeviceConfig, AudioError>>(1);

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let stream_result = open_stream(&config, device_name.as_deref(), move |samples| {
                    frames_counter.fetch_add(1, Ordering::Relaxed);
                    let _ = producer.write(samples);
                });

                let (_stream, dev_cfg) = match stream_result {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = startup_tx.send(Err(e));
                        CAPTURE_ACTIVE.store(false, Ordering::SeqCst);
                        return;
                    }
                };

                let _ = startup_tx.send(Ok(dev_cfg));
                tracing::info!(
                    sample_rate = dev_cfg.sample_rate,
                    channels = dev_cfg.channels,
                    "Audio capture started"
                );

                // Keep the stream alive until shutdown is requested
                while !shutdown_flag.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(50));
                }

                tracing::info!("Audio capture stopped");
                CAPTURE_ACTIVE.store(false, Ordering::SeqCst);
            })
            .map_err(|e| {
                CAPTURE_ACTIVE.store(false, Ordering::SeqCst);
                AudioError::Fatal(format!("Failed to spawn capture thread: {e}"))
            })?;

        match startup_rx.recv() {
            Ok(Ok(dev_cfg)) => Ok((
                Self {
                    handle: Some(handle),
                    shutdown,
                    frames_captured,
                },
                dev_cfg,
            )),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                CAPTURE_ACTIVE.store(false, Ordering::SeqCst);
                Err(AudioError::Fatal("Capture thread died during startup".into()))
            }
        }
    }

    /// Stop the capture thread and release the device. Idempotent.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CaptureThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_stream(
    config: &AudioConfig,
    device_name: Option<&str>,
    mut on_samples: impl FnMut(&[i16]) + Send + 'static,
) -> Result<(cpal::Stream, DeviceConfig), AudioError> {
    let host = cpal::default_host();

    let device = match device_name {
        Some(name) => host
            .input_devices()
            .map_err(|e| AudioError::Fatal(format!("Failed to enumerate devices: {e}")))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or(AudioError::DeviceNotFound {
                name: Some(name.to_string()),
            })?,
        None => host
            .default_input_device()
            .ok_or(AudioError::DeviceNotFound { name: None })?,
    };

    // The pipeline runs at a single fixed rate; pick a supported config at
    // that rate rather than resampling.
    let supported = device
        .supported_input_configs()?
        .find(|range| {
            range.min_sample_rate().0 <= config.sample_rate_hz
                && range.max_sample_rate().0 >= config.sample_rate_hz
        })
        .ok_or_else(|| AudioError::FormatNotSupported {
            format: format!("{} Hz input", config.sample_rate_hz),
        })?
        .with_sample_rate(cpal::SampleRate(config.sample_rate_hz));

    let sample_format = supported.sample_format();
    let stream_config: StreamConfig = supported.into();
    let dev_cfg = DeviceConfig {
        sample_rate: stream_config.sample_rate.0,
        channels: stream_config.channels,
    };

    let err_fn = |e: cpal::StreamError| {
        tracing::error!("Capture stream error: {e}");
    };

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _| on_samples(data),
            err_fn,
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _| {
                let converted: Vec<i16> = data
                    .iter()
                    .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    .collect();
                on_samples(&converted);
            },
            err_fn,
            None,
        ),
        other => {
            return Err(AudioError::FormatNotSupported {
                format: format!("{other:?}"),
            })
        }
    }
    .map_err(map_build_error)?;

    stream.play()?;
    Ok((stream, dev_cfg))
}

/// Mobile and desktop hosts report a denied microphone as an unavailable
/// device at stream-build time; surface that as the user-facing permission
/// kind so the UI can show a settings prompt instead of a generic failure.
fn map_build_error(e: cpal::BuildStreamError) -> AudioError {
    match e {
        cpal::BuildStreamError::DeviceNotAvailable => AudioError::PermissionDenied,
        other => AudioError::BuildStream(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_error_maps_unavailable_to_permission() {
        let err = map_build_error(cpal::BuildStreamError::DeviceNotAvailable);
        assert!(matches!(err, AudioError::PermissionDenied));

        let err = map_build_error(cpal::BuildStreamError::InvalidArgument);
        assert!(matches!(err, AudioError::BuildStream(_)));
    }
}
