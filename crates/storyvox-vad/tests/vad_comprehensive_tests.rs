use storyvox_vad::{
    classifier::EnergyClassifier, config::VadConfig, constants::FRAME_SIZE_SAMPLES, VadEvent,
    VadProcessor,
};

fn frame_at_db(db: f32) -> Vec<i16> {
    let amplitude = (10f32.powf(db / 20.0) * 32768.0) as i16;
    vec![amplitude; FRAME_SIZE_SAMPLES]
}

fn classifier() -> EnergyClassifier {
    EnergyClassifier::new(VadConfig {
        min_speech_duration_ms: 100,
        min_silence_duration_ms: 300,
        speech_threshold_offset_db: 15.0,
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn full_interaction_cycle() {
    // Calibrate at -50 dB floor; speech threshold becomes -35 dB.
    let mut vad = classifier();
    vad.calibrate(-50.0);

    // 10 frames of simulated speech at -25 dB: exactly one SpeechStart,
    // fired within the run (min 100ms / 20ms frames = 5 frames).
    let speech = frame_at_db(-25.0);
    let mut starts = 0;
    let mut start_frame = None;
    for i in 0..10 {
        if let Some(VadEvent::SpeechStart { .. }) = vad.process(&speech).unwrap() {
            starts += 1;
            start_frame = Some(i);
        }
    }
    assert_eq!(starts, 1);
    assert_eq!(start_frame, Some(4)); // 5th frame confirms the run
    assert!(vad.is_speaking());

    // 30 frames of silence at -60 dB: exactly one SpeechEnd with a
    // positive duration close to the true 200ms run.
    let silence = frame_at_db(-60.0);
    let mut ends = 0;
    let mut measured = 0u64;
    for _ in 0..30 {
        if let Some(VadEvent::SpeechEnd { duration_ms, .. }) = vad.process(&silence).unwrap() {
            ends += 1;
            measured = duration_ms;
        }
    }
    assert_eq!(ends, 1);
    assert!(measured > 0);
    // True run length 10 frames * 20ms = 200ms, within one frame duration
    assert!((measured as i64 - 200).unsigned_abs() <= 20);
    assert!(!vad.is_speaking());
}

#[test]
fn short_blip_never_reports_speech_start() {
    let mut vad = classifier();
    vad.calibrate(-50.0);

    let speech = frame_at_db(-25.0);
    let silence = frame_at_db(-60.0);

    // 4 frames (80ms) of speech is below the 100ms minimum
    for _ in 0..4 {
        assert!(vad.process(&speech).unwrap().is_none());
    }
    for _ in 0..30 {
        assert!(vad.process(&silence).unwrap().is_none());
    }
    assert!(!vad.is_speaking());
}

#[test]
fn brief_pause_never_reports_speech_end() {
    let mut vad = classifier();
    vad.calibrate(-50.0);

    let speech = frame_at_db(-25.0);
    let silence = frame_at_db(-60.0);

    for _ in 0..10 {
        vad.process(&speech).unwrap();
    }
    assert!(vad.is_speaking());

    // 14 frames (280ms) of silence is below the 300ms minimum
    for _ in 0..14 {
        assert!(vad.process(&silence).unwrap().is_none());
    }
    assert!(vad.is_speaking());

    // Speech resumes: still one uninterrupted run
    for _ in 0..10 {
        assert!(vad.process(&speech).unwrap().is_none());
    }
    assert!(vad.is_speaking());
}

#[test]
fn sub_threshold_energy_never_transitions() {
    let mut vad = classifier();
    vad.calibrate(-50.0);

    // Everything below -35 dB (floor + offset) stays silent
    for db in [-36.0, -40.0, -50.0, -70.0, -90.0] {
        let frame = frame_at_db(db);
        for _ in 0..50 {
            assert!(vad.process(&frame).unwrap().is_none());
        }
        assert!(!vad.is_speaking());
    }
}

#[test]
fn events_are_ordered_and_timestamps_monotonic() {
    let mut vad = classifier();
    vad.calibrate(-50.0);

    let speech = frame_at_db(-25.0);
    let silence = frame_at_db(-60.0);
    let mut timestamps = Vec::new();

    for _ in 0..3 {
        for _ in 0..10 {
            if let Some(event) = vad.process(&speech).unwrap() {
                match event {
                    VadEvent::SpeechStart { timestamp_ms, .. } => timestamps.push(timestamp_ms),
                    VadEvent::SpeechEnd { .. } => panic!("SpeechEnd during speech run"),
                }
            }
        }
        for _ in 0..20 {
            if let Some(event) = vad.process(&silence).unwrap() {
                match event {
                    VadEvent::SpeechEnd { timestamp_ms, .. } => timestamps.push(timestamp_ms),
                    VadEvent::SpeechStart { .. } => panic!("SpeechStart during silence run"),
                }
            }
        }
    }

    // Three cycles: start/end alternating, strictly increasing timestamps
    assert_eq!(timestamps.len(), 6);
    for pair in timestamps.windows(2) {
        assert!(pair[0] < pair[1]);
    }
}

#[test]
fn random_low_level_noise_stays_silent() {
    use rand::Rng;

    let mut vad = classifier();
    vad.calibrate(-50.0);

    // Uniform noise with peaks at -40 dBFS; RMS sits even lower, well
    // under the -35 dB threshold.
    let mut rng = rand::thread_rng();
    let peak = (10f32.powf(-40.0 / 20.0) * 32768.0) as i16;
    for _ in 0..100 {
        let frame: Vec<i16> = (0..FRAME_SIZE_SAMPLES)
            .map(|_| rng.gen_range(-peak..=peak))
            .collect();
        assert!(vad.process(&frame).unwrap().is_none());
        assert!(!vad.is_speaking());
    }
}

#[test]
fn noisy_floor_raises_threshold() {
    let mut vad = classifier();
    // A noisy room calibration at -30 dB pushes the threshold to -15 dB,
    // so ordinary -25 dB speech no longer triggers.
    vad.calibrate(-30.0);

    let speech = frame_at_db(-25.0);
    for _ in 0..50 {
        assert!(vad.process(&speech).unwrap().is_none());
    }
    assert!(!vad.is_speaking());

    let loud = frame_at_db(-10.0);
    let mut started = false;
    for _ in 0..10 {
        if let Some(VadEvent::SpeechStart { .. }) = vad.process(&loud).unwrap() {
            started = true;
        }
    }
    assert!(started);
}
