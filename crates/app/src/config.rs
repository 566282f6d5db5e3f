//! Application settings: defaults here, overridable from `storyvox.toml`
//! and `STORYVOX_*` environment variables.

use std::time::Duration;

use serde::Deserialize;

use storyvox_audio::{CalibrationConfig, EncoderConfig};
use storyvox_foundation::AudioConfig;
use storyvox_transport::TransportConfig;
use storyvox_vad::VadConfig;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Input device name; `None` picks the system default.
    pub device: Option<String>,
    pub audio: AudioConfig,
    pub vad: VadConfig,
    pub encoder: EncoderSettings,
    pub calibration: CalibrationSettings,
    pub transport: TransportSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    pub vad_enabled: bool,
    pub drop_silence: bool,
    pub bitrate_bps: i32,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            vad_enabled: true,
            drop_silence: true,
            bitrate_bps: 24_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    pub duration_ms: u64,
    pub sample_interval_ms: u64,
    pub fallback_floor_db: f32,
    pub noisy_floor_db: f32,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        let defaults = CalibrationConfig::default();
        Self {
            duration_ms: defaults.duration_ms,
            sample_interval_ms: defaults.sample_interval_ms,
            fallback_floor_db: defaults.fallback_floor_db,
            noisy_floor_db: defaults.noisy_floor_db,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub endpoint: String,
    pub connect_timeout_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_reconnect_attempts: u32,
}

impl Default for TransportSettings {
    fn default() -> Self {
        let defaults = TransportConfig::default();
        Self {
            endpoint: defaults.endpoint,
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
            heartbeat_interval_secs: defaults.heartbeat_interval.as_secs(),
            idle_timeout_secs: defaults.idle_timeout.as_secs(),
            max_reconnect_attempts: defaults.max_reconnect_attempts,
        }
    }
}

impl Settings {
    /// Defaults, then `storyvox.toml` (if present), then `STORYVOX_*` env
    /// vars (`STORYVOX_TRANSPORT__ENDPOINT=...`).
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("storyvox").required(false))
            .add_source(config::Environment::with_prefix("STORYVOX").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig {
            audio: self.audio,
            vad: self.vad,
            vad_enabled: self.encoder.vad_enabled,
            drop_silence: self.encoder.drop_silence,
            bitrate_bps: self.encoder.bitrate_bps,
        }
    }

    pub fn calibration_config(&self) -> CalibrationConfig {
        CalibrationConfig {
            duration_ms: self.calibration.duration_ms,
            sample_interval_ms: self.calibration.sample_interval_ms,
            fallback_floor_db: self.calibration.fallback_floor_db,
            noisy_floor_db: self.calibration.noisy_floor_db,
        }
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            endpoint: self.transport.endpoint.clone(),
            connect_timeout: Duration::from_secs(self.transport.connect_timeout_secs),
            heartbeat_interval: Duration::from_secs(self.transport.heartbeat_interval_secs),
            idle_timeout: Duration::from_secs(self.transport.idle_timeout_secs),
            max_reconnect_attempts: self.transport.max_reconnect_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_component_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.audio.sample_rate_hz, 16_000);
        assert_eq!(settings.vad.frame_duration_ms, 20);
        assert_eq!(settings.calibration.fallback_floor_db, -40.0);
        assert_eq!(settings.transport.connect_timeout_secs, 10);
        assert_eq!(settings.transport.max_reconnect_attempts, 5);
        assert!(settings.encoder.drop_silence);
    }

    #[test]
    fn conversions_preserve_values() {
        let settings = Settings::default();
        let transport = settings.transport_config();
        assert_eq!(transport.idle_timeout, Duration::from_secs(60));
        assert_eq!(transport.heartbeat_interval, Duration::from_secs(30));

        let encoder = settings.encoder_config();
        assert_eq!(encoder.bitrate_bps, 24_000);
        assert_eq!(encoder.vad.frame_size_samples(), 320);
    }
}
