//! Per-clip detection pipeline.
//!
//! A [`Detector`] owns one immutable [`DetectorConfig`] and drives a clip
//! through every stage:
//!
//! ```text
//! Loaded -> ForegroundIsolated -> BandValidated -> NotFound
//!                                              \-> Found -> Clustered -> Labeled
//! ```
//!
//! A clip is `Found` as soon as one band row keeps a periodic pulse. Found
//! clips whose reconstruction yields no onset stay `Clustered` with an empty
//! interval list; nothing is written for them.
//!
//! ## Example
//!
//! ```rust,no_run
//! use crosswalk_label::{Detector, DetectorConfig, FileLabelSink, load_wav};
//! use std::path::Path;
//!
//! # fn main() -> crosswalk_label::CrosswalkResult<()> {
//! let detector = Detector::new(DetectorConfig::new())?;
//! let audio = load_wav(Path::new("recording.wav"))?;
//! let mut sink = FileLabelSink::new(".");
//! let result = detector.label_clip(&audio, "recording", &mut sink)?;
//! println!("found: {}, beeps: {}", result.found, result.intervals.len());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::labels::{DEFAULT_LABEL, LabelSink, LabeledInterval};
use crate::operations::{
    AudioOnsets, AudioTransforms, ClusterConfig, ForegroundConfig, FrequencyBand, OnsetConfig,
    PulseTiming, StftConfig, cluster_onsets, isolate_bands, isolate_foreground_with,
    validate_rows,
};
use crate::progress::{CancellationToken, NoProgress, ProgressReporter, Stage, StageProgress};
use crate::utils::audio_math::{db_to_amplitude, time_to_frames};
use crate::{AudioSignal, CrosswalkResult, ParameterError};

#[cfg(test)]
mod tests;

/// Every tunable of the detection pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Spectral front-end parameters.
    pub stft: StftConfig,
    /// Foreground isolation parameters.
    pub foreground: ForegroundConfig,
    /// Expected beep length in seconds.
    pub beep_duration_seconds: f64,
    /// Expected beep spacing in seconds.
    pub beep_period_seconds: f64,
    /// Allowed deviation from the beep spacing in seconds.
    pub period_tolerance_seconds: f64,
    /// Frames subtracted from both the converted period and its tolerance.
    pub period_offset_frames: usize,
    /// Bands searched for beeps. Disabled entries are skipped.
    pub bands: Vec<FrequencyBand>,
    /// Cells quieter than this level are dropped; `None` keeps every cell.
    pub amplitude_threshold_db: Option<f64>,
    /// Onset detection on the reconstructed beeps.
    pub onset: OnsetConfig,
    /// Clustering of onset times.
    pub cluster: ClusterConfig,
    /// Label written for every beep.
    pub label: String,
}

impl DetectorConfig {
    /// Standard beacon configuration: 1024-sample window, 26.67 ms beeps every
    /// 1.01333 s, one 2500-2800 Hz band and a -40 dB threshold.
    pub fn new() -> Self {
        Self {
            stft: StftConfig::new(),
            foreground: ForegroundConfig::new(),
            beep_duration_seconds: 0.02667,
            beep_period_seconds: 1.01333,
            period_tolerance_seconds: 0.02667,
            period_offset_frames: 2,
            bands: vec![FrequencyBand::DISABLED, FrequencyBand::new(2500.0, 2800.0)],
            amplitude_threshold_db: Some(-40.0),
            onset: OnsetConfig::new(),
            cluster: ClusterConfig::new(),
            label: DEFAULT_LABEL.to_string(),
        }
    }

    /// Sets the STFT window size; the hop becomes a quarter window.
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.stft = StftConfig::with_window_size(window_size);
        self
    }

    /// Sets the foreground isolation parameters.
    pub fn with_foreground(mut self, foreground: ForegroundConfig) -> Self {
        self.foreground = foreground;
        self
    }

    /// Sets the expected beep duration, period and period tolerance in seconds.
    pub fn with_beep_timing(mut self, duration: f64, period: f64, tolerance: f64) -> Self {
        self.beep_duration_seconds = duration;
        self.beep_period_seconds = period;
        self.period_tolerance_seconds = tolerance;
        self
    }

    /// Sets the frames subtracted from the converted period and tolerance.
    pub fn with_period_offset_frames(mut self, frames: usize) -> Self {
        self.period_offset_frames = frames;
        self
    }

    /// Replaces the searched bands.
    pub fn with_bands(mut self, bands: Vec<FrequencyBand>) -> Self {
        self.bands = bands;
        self
    }

    /// Sets or disables the amplitude threshold.
    pub fn with_amplitude_threshold_db(mut self, threshold_db: Option<f64>) -> Self {
        self.amplitude_threshold_db = threshold_db;
        self
    }

    /// Sets the onset detection parameters.
    pub fn with_onset(mut self, onset: OnsetConfig) -> Self {
        self.onset = onset;
        self
    }

    /// Sets the clustering bandwidth in seconds.
    pub fn with_cluster_bandwidth(mut self, bandwidth_seconds: f64) -> Self {
        self.cluster.bandwidth = bandwidth_seconds;
        self
    }

    /// Sets the label text.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Linear amplitude threshold, if enabled.
    pub fn amplitude_threshold(&self) -> Option<f64> {
        self.amplitude_threshold_db.map(db_to_amplitude)
    }

    /// Beep timing in frames for a clip at `sample_rate`.
    ///
    /// Seconds are rounded to the nearest frame, then the period and its
    /// tolerance are reduced by `period_offset_frames` (never below zero).
    pub fn pulse_timing(&self, sample_rate: u32) -> PulseTiming {
        let sr = f64::from(sample_rate);
        let hop = self.stft.hop_size;
        let offset = self.period_offset_frames;
        PulseTiming {
            duration: time_to_frames(self.beep_duration_seconds, sr, hop),
            period: time_to_frames(self.beep_period_seconds, sr, hop).saturating_sub(offset),
            tolerance: time_to_frames(self.period_tolerance_seconds, sr, hop)
                .saturating_sub(offset),
        }
    }

    /// Validates every field.
    pub fn validate(&self) -> CrosswalkResult<()> {
        self.stft.validate()?;
        self.foreground.validate()?;
        self.onset.validate()?;
        self.cluster.validate()?;

        let timings = [
            ("beep_duration_seconds", self.beep_duration_seconds),
            ("beep_period_seconds", self.beep_period_seconds),
        ];
        for (name, value) in timings {
            if !(value.is_finite() && value > 0.0) {
                return Err(ParameterError::invalid_value(name, "must be positive").into());
            }
        }
        if !(self.period_tolerance_seconds.is_finite() && self.period_tolerance_seconds >= 0.0) {
            return Err(ParameterError::invalid_value(
                "period_tolerance_seconds",
                "must be finite and non-negative",
            )
            .into());
        }
        for band in &self.bands {
            band.validate()?;
        }
        if self.amplitude_threshold_db.is_some_and(|db| !db.is_finite()) {
            return Err(ParameterError::invalid_value("amplitude_threshold_db", "must be finite").into());
        }
        if self.label.is_empty() || self.label.contains(['\n', '\r']) {
            return Err(ParameterError::invalid_value(
                "label",
                "must be non-empty and fit on one line",
            )
            .into());
        }
        Ok(())
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Position of a clip in the detection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionState {
    /// Audio accepted and transformed.
    Loaded,
    /// Background texture masked out.
    ForegroundIsolated,
    /// Band rows isolated and validated.
    BandValidated,
    /// No periodic pulse survived. Terminal.
    NotFound,
    /// At least one periodic pulse survived.
    Found,
    /// Onset clusters computed.
    Clustered,
    /// Intervals handed to the label sink. Terminal.
    Labeled,
}

impl DetectionState {
    /// True for states after which no further stage runs.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::NotFound | Self::Labeled)
    }
}

/// Verdict and labels for one clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// True when any band row kept a periodic pulse.
    pub found: bool,
    /// Labeled beep intervals, ascending.
    pub intervals: Vec<LabeledInterval>,
    /// State reached by the clip.
    pub state: DetectionState,
}

impl DetectionResult {
    fn not_found() -> Self {
        Self {
            found: false,
            intervals: Vec::new(),
            state: DetectionState::NotFound,
        }
    }
}

/// Runs the detection pipeline on individual clips.
#[derive(Clone)]
pub struct Detector {
    config: DetectorConfig,
    reporter: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
}

impl fmt::Debug for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detector")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Detector {
    /// Creates a detector after validating `config`.
    pub fn new(config: DetectorConfig) -> CrosswalkResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            reporter: Arc::new(NoProgress),
            cancel: CancellationToken::new(),
        })
    }

    /// Sends progress events to `reporter`.
    pub fn with_progress<R: ProgressReporter + 'static>(mut self, reporter: R) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Uses `token` for cooperative cancellation.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The configuration in use.
    pub const fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// The cancellation token in use.
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn enter(&self, clip: &str, stage: Stage) -> CrosswalkResult<()> {
        self.cancel.check(stage)?;
        self.report(clip, stage, 0.0);
        Ok(())
    }

    fn report(&self, clip: &str, stage: Stage, percent: f64) {
        self.reporter.report(&StageProgress {
            clip: clip.to_string(),
            stage,
            percent,
        });
    }

    fn transition(clip: &str, state: DetectionState) -> DetectionState {
        debug!(clip, ?state, "state");
        state
    }

    /// Runs every analysis stage on `audio` and returns the verdict.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::CrosswalkError::InvalidAudio`] if the clip does not pass
    /// [`AudioSignal::validate`], with [`crate::CrosswalkError::Cancelled`] if
    /// the cancellation token fires, or with a parameter error if the clip's
    /// sample rate leaves the beep duration or period without a whole frame.
    pub fn detect(&self, audio: &AudioSignal, clip_id: &str) -> CrosswalkResult<DetectionResult> {
        audio.validate()?;
        let config = &self.config;
        let timing = config.pulse_timing(audio.sample_rate());
        timing.validate()?;

        self.enter(clip_id, Stage::Spectrogram)?;
        let spec = audio.stft(&config.stft)?;
        Self::transition(clip_id, DetectionState::Loaded);

        self.enter(clip_id, Stage::ForegroundIsolation)?;
        let mut last_percent = 0;
        let foreground = isolate_foreground_with(spec, &config.foreground, |done, total| {
            self.cancel.check(Stage::ForegroundIsolation)?;
            let percent = done * 100 / total.max(1);
            if percent > last_percent {
                last_percent = percent;
                self.report(clip_id, Stage::ForegroundIsolation, percent as f64);
            }
            Ok(())
        })?;
        Self::transition(clip_id, DetectionState::ForegroundIsolated);

        self.enter(clip_id, Stage::BandIsolation)?;
        let isolation = isolate_bands(foreground, &config.bands, config.amplitude_threshold())?;

        self.enter(clip_id, Stage::PulseValidation)?;
        let validation = validate_rows(isolation, &timing)?;
        Self::transition(clip_id, DetectionState::BandValidated);

        if !validation.found() {
            Self::transition(clip_id, DetectionState::NotFound);
            info!(clip = clip_id, found = false, "no crosswalk beeps");
            return Ok(DetectionResult::not_found());
        }
        Self::transition(clip_id, DetectionState::Found);

        self.enter(clip_id, Stage::OnsetClustering)?;
        let beeps = validation.spec.istft(Some(audio.len()));
        let onsets = beeps.detect_onsets(&config.onset)?;
        let clusters = cluster_onsets(&onsets, &config.cluster)?;
        let intervals: Vec<LabeledInterval> = clusters
            .iter()
            .map(|&t| LabeledInterval::from_seconds(t, config.beep_duration_seconds, config.label.as_str()))
            .collect();
        let state = Self::transition(clip_id, DetectionState::Clustered);

        info!(
            clip = clip_id,
            found = true,
            onsets = onsets.len(),
            beeps = intervals.len(),
            "crosswalk beeps detected"
        );
        Ok(DetectionResult {
            found: true,
            intervals,
            state,
        })
    }

    /// Detects beeps in `audio` and appends the resulting intervals to `sink`.
    ///
    /// Nothing is written when no interval was produced. The progress
    /// reporter is finished for the clip whether or not this succeeds.
    pub fn label_clip(
        &self,
        audio: &AudioSignal,
        clip_id: &str,
        sink: &mut dyn LabelSink,
    ) -> CrosswalkResult<DetectionResult> {
        let outcome = self.detect_and_append(audio, clip_id, sink);
        self.reporter.finish(clip_id);
        outcome
    }

    fn detect_and_append(
        &self,
        audio: &AudioSignal,
        clip_id: &str,
        sink: &mut dyn LabelSink,
    ) -> CrosswalkResult<DetectionResult> {
        let mut result = self.detect(audio, clip_id)?;

        if !result.intervals.is_empty() {
            self.enter(clip_id, Stage::Labelling)?;
            sink.append(clip_id, &result.intervals)?;
            result.state = Self::transition(clip_id, DetectionState::Labeled);
            self.report(clip_id, Stage::Labelling, 100.0);
        }
        Ok(result)
    }
}
