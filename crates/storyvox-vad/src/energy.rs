//! Frame energy calculation: RMS of 16-bit samples relative to full scale.
//!
//! These are pure functions so they can be used independently of the
//! classifier, e.g. by the noise calibrator or a UI level meter.

use crate::constants::DB_FLOOR;

const EPSILON: f32 = 1e-10;

/// Root-mean-square of a frame, normalized to [0, 1].
pub fn calculate_rms(frame: &[i16]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }

    let sum_squares: i64 = frame
        .iter()
        .map(|&sample| {
            let s = sample as i64;
            s * s
        })
        .sum();

    let mean_square = sum_squares as f64 / frame.len() as f64;
    (mean_square.sqrt() / 32768.0) as f32
}

/// Convert a normalized RMS value to dBFS. Zero-energy frames map to the
/// floor value rather than negative infinity.
pub fn rms_to_dbfs(rms: f32) -> f32 {
    if rms <= EPSILON {
        return DB_FLOOR;
    }
    20.0 * rms.log10()
}

/// Frame energy in dBFS.
pub fn calculate_dbfs(frame: &[i16]) -> f32 {
    rms_to_dbfs(calculate_rms(frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FRAME_SIZE_SAMPLES;

    #[test]
    fn silence_returns_floor_dbfs() {
        let silence = vec![0i16; FRAME_SIZE_SAMPLES];
        let db = calculate_dbfs(&silence);
        assert!(db <= DB_FLOOR);
    }

    #[test]
    fn full_scale_returns_zero_dbfs() {
        let full_scale = vec![32767i16; FRAME_SIZE_SAMPLES];
        let db = calculate_dbfs(&full_scale);
        assert!((db - 0.0).abs() < 0.1);
    }

    #[test]
    fn empty_frame_maps_to_floor() {
        assert_eq!(calculate_rms(&[]), 0.0);
        assert_eq!(calculate_dbfs(&[]), DB_FLOOR);
    }

    #[test]
    fn half_scale_sine_rms() {
        let sine_wave: Vec<i16> = (0..FRAME_SIZE_SAMPLES)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / FRAME_SIZE_SAMPLES as f32;
                (phase.sin() * 16384.0) as i16
            })
            .collect();

        let rms = calculate_rms(&sine_wave);
        // Sine RMS is amplitude / sqrt(2): 0.5 / 1.414 = 0.354
        assert!((rms - 0.354).abs() < 0.01);
    }
}
