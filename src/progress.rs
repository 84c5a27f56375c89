//! Progress reporting and cooperative cancellation for detection runs.
//!
//! The detector emits a [`StageProgress`] event when each pipeline stage
//! starts and repeatedly while the foreground similarity search runs. Callers
//! subscribe by passing a [`ProgressReporter`]; [`NoProgress`] ignores every
//! event.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "progress-tracking")]
use indicatif::{ProgressBar, ProgressStyle};

use crate::{CrosswalkError, CrosswalkResult};

/// Pipeline stage of a detection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Short-time Fourier transform of the clip.
    Spectrogram,
    /// Nearest-neighbour background estimation and soft masking.
    ForegroundIsolation,
    /// Band selection and amplitude threshold.
    BandIsolation,
    /// Duration and period checks on the band rows.
    PulseValidation,
    /// Reconstruction, onset detection and clustering.
    OnsetClustering,
    /// Label lines handed to the sink.
    Labelling,
}

impl Stage {
    /// Stages in pipeline order.
    pub const ALL: [Self; 6] = [
        Self::Spectrogram,
        Self::ForegroundIsolation,
        Self::BandIsolation,
        Self::PulseValidation,
        Self::OnsetClustering,
        Self::Labelling,
    ];

    /// Stable lower-case name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Spectrogram => "spectrogram",
            Self::ForegroundIsolation => "foreground_isolation",
            Self::BandIsolation => "band_isolation",
            Self::PulseValidation => "pulse_validation",
            Self::OnsetClustering => "onset_clustering",
            Self::Labelling => "labelling",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single progress event.
#[derive(Debug, Clone, PartialEq)]
pub struct StageProgress {
    /// Identifier of the clip being processed.
    pub clip: String,
    /// Stage the event belongs to.
    pub stage: Stage,
    /// Completion of `stage`, from 0.0 to 100.0.
    pub percent: f64,
}

impl StageProgress {
    /// Position of the event across the whole run, from 0.0 to 1.0.
    pub fn overall_progress(&self) -> f64 {
        let index = Stage::ALL.iter().position(|&s| s == self.stage).unwrap_or(0);
        let stages = Stage::ALL.len() as f64;
        (index as f64 + self.percent.clamp(0.0, 100.0) / 100.0) / stages
    }
}

/// Receives progress events from a detector.
pub trait ProgressReporter: Send + Sync {
    /// Reports one progress event.
    fn report(&self, progress: &StageProgress);

    /// Called once the clip has been fully processed.
    fn finish(&self, clip: &str) {
        let _ = clip;
    }
}

/// Reporter that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _progress: &StageProgress) {}
}

/// Reporter that forwards events to `tracing` at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn report(&self, progress: &StageProgress) {
        tracing::trace!(
            clip = %progress.clip,
            stage = %progress.stage,
            percent = progress.percent,
            "progress"
        );
    }

    fn finish(&self, clip: &str) {
        tracing::trace!(clip, "clip finished");
    }
}

/// Callback-based progress reporter.
pub struct CallbackProgress<F> {
    callback: F,
}

impl<F> CallbackProgress<F>
where
    F: Fn(&StageProgress) + Send + Sync,
{
    /// Create a new callback progress reporter.
    pub const fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for CallbackProgress<F>
where
    F: Fn(&StageProgress) + Send + Sync,
{
    fn report(&self, progress: &StageProgress) {
        (self.callback)(progress);
    }
}

impl<F> fmt::Debug for CallbackProgress<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackProgress").finish_non_exhaustive()
    }
}

/// Progress bar-based reporter using indicatif.
///
/// The bar tracks overall progress of the current clip in permille.
#[cfg(feature = "progress-tracking")]
#[derive(Debug)]
pub struct ProgressBarReporter {
    bar: ProgressBar,
}

#[cfg(feature = "progress-tracking")]
impl ProgressBarReporter {
    /// Create a new progress bar reporter.
    pub fn new() -> Self {
        let bar = ProgressBar::new(1000);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }

}

#[cfg(feature = "progress-tracking")]
impl Default for ProgressBarReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "progress-tracking")]
impl ProgressReporter for ProgressBarReporter {
    fn report(&self, progress: &StageProgress) {
        self.bar
            .set_position((progress.overall_progress() * 1000.0).round() as u64);
        self.bar
            .set_message(format!("{} ({})", progress.clip, progress.stage));
    }

    fn finish(&self, clip: &str) {
        self.bar.finish_with_message(format!("{clip} done"));
    }
}

/// Shared flag used to stop a detection run between stages.
///
/// Clones share the same flag, so a token handed to a detector can be
/// cancelled from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// True once [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Returns [`CrosswalkError::Cancelled`] if cancellation was requested.
    pub fn check(&self, stage: Stage) -> CrosswalkResult<()> {
        if self.is_cancelled() {
            return Err(CrosswalkError::Cancelled {
                stage: stage.name(),
            });
        }
        Ok(())
    }
}
