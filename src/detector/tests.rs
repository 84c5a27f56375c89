use super::*;
use crate::labels::{FileLabelSink, MemoryLabelSink};
use crate::progress::CallbackProgress;
use crate::utils::generation::{PulseTrain, silence};
use crate::CrosswalkError;
use std::sync::Mutex;
use std::time::Duration;

const SAMPLE_RATE: u32 = 48000;

/// Three beacon beeps at the configured duration and period, in six seconds of silence.
fn beacon_clip() -> AudioSignal {
    PulseTrain {
        frequency: 2650.0,
        pulse_seconds: 0.02667,
        period_seconds: 1.01333,
        count: 3,
        offset_seconds: 0.5,
        amplitude: 0.5,
    }
    .render(Duration::from_secs(6), SAMPLE_RATE)
}

fn detector() -> Detector {
    Detector::new(DetectorConfig::new()).unwrap()
}

fn parse_line(line: &str) -> (u64, u64, String) {
    let mut parts = line.split(' ');
    let start = parts.next().unwrap().parse().unwrap();
    let end = parts.next().unwrap().parse().unwrap();
    let label = parts.next().unwrap().to_string();
    assert!(parts.next().is_none());
    (start, end, label)
}

#[test]
fn test_default_config_is_valid() {
    let config = DetectorConfig::new();
    assert!(config.validate().is_ok());
    assert_eq!(config.stft.hop_size, 256);
    assert_eq!(config.amplitude_threshold(), Some(db_to_amplitude(-40.0)));
    assert_eq!(
        config.pulse_timing(48000),
        PulseTiming {
            duration: 5,
            period: 188,
            tolerance: 3,
        }
    );
}

#[test]
fn test_pulse_timing_rounds_then_offsets() {
    let config = DetectorConfig::new().with_period_offset_frames(0);
    assert_eq!(
        config.pulse_timing(48000),
        PulseTiming {
            duration: 5,
            period: 190,
            tolerance: 5,
        }
    );

    // 0.02667 s at 44.1 kHz is 4.59 frames and rounds up
    let timing = DetectorConfig::new().pulse_timing(44100);
    assert_eq!(timing.duration, 5);
    assert_eq!(timing.period, 173);
    assert_eq!(timing.tolerance, 3);

    // the offset never underflows
    let wide = DetectorConfig::new().with_period_offset_frames(10);
    assert_eq!(wide.pulse_timing(48000).tolerance, 0);
}

#[test]
fn test_config_serde_roundtrip() {
    let config = DetectorConfig::new()
        .with_bands(vec![FrequencyBand::new(1200.0, 1500.0), FrequencyBand::DISABLED])
        .with_amplitude_threshold_db(None)
        .with_period_offset_frames(1)
        .with_label("beacon");

    let json = serde_json::to_string(&config).unwrap();
    let parsed: DetectorConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);

    let default: DetectorConfig =
        serde_json::from_str(&serde_json::to_string(&DetectorConfig::new()).unwrap()).unwrap();
    assert_eq!(default, DetectorConfig::new());
}

#[test]
fn test_odd_window_detects_without_panic() {
    let detector = Detector::new(DetectorConfig::new().with_window_size(1023)).unwrap();
    let audio = AudioSignal::from_slice(&vec![0.1; 255 * 20], SAMPLE_RATE);

    let result = detector.detect(&audio, "odd").unwrap();
    assert!(!result.found);
}

#[test]
fn test_invalid_config_rejected() {
    let bad_band = DetectorConfig::new().with_bands(vec![FrequencyBand::new(3000.0, 2000.0)]);
    assert!(Detector::new(bad_band).is_err());

    let bad_label = DetectorConfig::new().with_label("two\nlines");
    assert!(Detector::new(bad_label).is_err());

    let bad_timing = DetectorConfig::new().with_beep_timing(0.0, 1.0, 0.01);
    assert!(matches!(Detector::new(bad_timing), Err(CrosswalkError::Parameter(_))));
}

#[test]
fn test_end_to_end_three_beeps() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = FileLabelSink::new(dir.path());

    let result = detector()
        .label_clip(&beacon_clip(), "beacon", &mut sink)
        .unwrap();

    assert!(result.found);
    assert_eq!(result.state, DetectionState::Labeled);
    assert_eq!(result.intervals.len(), 3);

    let contents = std::fs::read_to_string(sink.label_path("beacon")).unwrap();
    let lines: Vec<_> = contents.lines().map(parse_line).collect();
    assert_eq!(lines.len(), 3);

    for (start, end, label) in &lines {
        assert_eq!(label, "crosswalk");
        assert_eq!(end - start, 27);
    }
    // first beep starts at 500 ms
    assert!(lines[0].0.abs_diff(500) < 100, "first beep at {} ms", lines[0].0);
    for pair in lines.windows(2) {
        assert!(pair[1].0 > pair[0].0);
        let spacing = pair[1].0 - pair[0].0;
        assert!(spacing.abs_diff(1013) <= 30, "spacing {spacing} ms");
    }
}

#[test]
fn test_appends_on_second_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = FileLabelSink::new(dir.path());
    let detector = detector();
    let clip = beacon_clip();

    detector.label_clip(&clip, "beacon", &mut sink).unwrap();
    let first = std::fs::read_to_string(sink.label_path("beacon")).unwrap();

    detector.label_clip(&clip, "beacon", &mut sink).unwrap();
    let second = std::fs::read_to_string(sink.label_path("beacon")).unwrap();

    assert!(!first.is_empty());
    assert_eq!(second, format!("{first}{first}"));
}

#[test]
fn test_silence_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = FileLabelSink::new(dir.path());
    let audio = silence(Duration::from_secs(3), SAMPLE_RATE);

    let result = detector().label_clip(&audio, "quiet", &mut sink).unwrap();

    assert!(!result.found);
    assert!(result.intervals.is_empty());
    assert_eq!(result.state, DetectionState::NotFound);
    assert!(!sink.label_path("quiet").exists());
}

#[cfg(feature = "random-generation")]
#[test]
fn test_white_noise_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = FileLabelSink::new(dir.path());
    let detector = detector();

    // both levels sit above the -40 dB cell threshold
    for amplitude in [0.05, 0.1] {
        for seed in 1..=3 {
            let audio = crate::utils::generation::white_noise(
                Duration::from_secs(6),
                SAMPLE_RATE,
                amplitude,
                Some(seed),
            );
            let clip = format!("noise_{seed}");

            let result = detector.label_clip(&audio, &clip, &mut sink).unwrap();

            assert!(!result.found, "amplitude {amplitude}, seed {seed}");
            assert!(!sink.label_path(&clip).exists());
        }
    }
}

#[test]
fn test_empty_band_never_found() {
    let config = DetectorConfig::new().with_bands(vec![FrequencyBand::DISABLED]);
    let detector = Detector::new(config).unwrap();
    let mut sink = MemoryLabelSink::new();

    let result = detector.label_clip(&beacon_clip(), "beacon", &mut sink).unwrap();

    assert!(!result.found);
    assert_eq!(sink.clip_count(), 0);
}

#[test]
fn test_invalid_audio_rejected() {
    let audio = AudioSignal::from_slice(&[0.0, f64::INFINITY, 0.0], SAMPLE_RATE);
    let mut sink = MemoryLabelSink::new();
    let err = detector().label_clip(&audio, "broken", &mut sink).unwrap_err();
    assert!(matches!(err, CrosswalkError::InvalidAudio { .. }));
}

#[derive(Clone, Default)]
struct FinishedClips(Arc<Mutex<Vec<String>>>);

impl ProgressReporter for FinishedClips {
    fn report(&self, _progress: &StageProgress) {}

    fn finish(&self, clip: &str) {
        self.0.lock().unwrap().push(clip.to_string());
    }
}

#[test]
fn test_reporter_finished_on_failure() {
    struct FailingSink;
    impl LabelSink for FailingSink {
        fn append(&mut self, _clip_id: &str, _intervals: &[LabeledInterval]) -> CrosswalkResult<()> {
            Err(std::io::Error::other("disk full").into())
        }
    }

    let finished = FinishedClips::default();
    let detector = detector().with_progress(finished.clone());

    let broken = AudioSignal::from_slice(&[0.0, f64::NAN], SAMPLE_RATE);
    assert!(detector.label_clip(&broken, "broken", &mut FailingSink).is_err());

    let err = detector
        .label_clip(&beacon_clip(), "beacon", &mut FailingSink)
        .unwrap_err();
    assert!(matches!(err, CrosswalkError::Io(_)));

    assert_eq!(*finished.0.lock().unwrap(), vec!["broken", "beacon"]);
}

#[test]
fn test_cancelled_before_start() {
    let token = CancellationToken::new();
    token.cancel();
    let detector = detector().with_cancellation(token);

    let err = detector
        .detect(&silence(Duration::from_secs(1), SAMPLE_RATE), "clip")
        .unwrap_err();
    assert!(matches!(err, CrosswalkError::Cancelled { stage: "spectrogram" }));
}

#[test]
fn test_cancelled_during_similarity_search() {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let detector = detector()
        .with_cancellation(token)
        .with_progress(CallbackProgress::new(move |p: &StageProgress| {
            if p.stage == Stage::ForegroundIsolation && p.percent > 0.0 {
                trigger.cancel();
            }
        }));

    let audio = silence(Duration::from_secs(3), SAMPLE_RATE);
    let err = detector.detect(&audio, "clip").unwrap_err();
    assert!(matches!(
        err,
        CrosswalkError::Cancelled {
            stage: "foreground_isolation"
        }
    ));
}

#[test]
fn test_progress_follows_stage_order() {
    let stages = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&stages);
    let detector = detector().with_progress(CallbackProgress::new(move |p: &StageProgress| {
        let mut seen = seen.lock().unwrap();
        if seen.last() != Some(&p.stage) {
            seen.push(p.stage);
        }
    }));

    let result = detector
        .detect(&silence(Duration::from_secs(3), SAMPLE_RATE), "clip")
        .unwrap();

    assert!(!result.found);
    assert_eq!(
        *stages.lock().unwrap(),
        vec![
            Stage::Spectrogram,
            Stage::ForegroundIsolation,
            Stage::BandIsolation,
            Stage::PulseValidation,
        ]
    );
}
