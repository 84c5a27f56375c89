//! Directory-level processing.
//!
//! Every regular file of a directory is handled on its own: non-WAV files are
//! skipped, unreadable or invalid audio is reported and ignored, and a label
//! write failure only affects the clip being written. None of these stop the
//! batch. Only clips that were fully processed count towards the summary.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::io::{clip_id, is_wav_file, list_regular_files, load_wav};
use crate::labels::LabelSink;
use crate::{CrosswalkError, DetectionResult, Detector};

pub mod error;
#[cfg(feature = "parallel-processing")]
pub mod parallel;

pub use error::{BatchError, BatchResult};

/// What happened to one file of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipOutcome {
    /// Processed; beeps were found.
    Found {
        /// Number of labeled intervals written.
        intervals: usize,
    },
    /// Processed; no beeps.
    NotFound,
    /// Not a WAV file.
    Skipped,
    /// Could not be decoded or failed the audio validity check.
    Invalid,
    /// Analysis or label output failed.
    Failed,
}

/// Outcome of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipReport {
    /// Path of the file.
    pub path: PathBuf,
    /// What happened to it.
    pub outcome: ClipOutcome,
}

/// Summary of a directory run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// WAV files fully processed.
    pub audio_files: usize,
    /// Processed files in which beeps were found.
    pub found: usize,
    /// Files skipped because they are not WAV files.
    pub skipped: usize,
    /// WAV files rejected as invalid audio.
    pub invalid: usize,
    /// WAV files whose analysis or label output failed.
    pub failed: usize,
    /// Per-file outcomes in listing order.
    pub clips: Vec<ClipReport>,
    /// Errors of the invalid and failed files.
    pub errors: Vec<BatchError>,
}

impl BatchReport {
    /// One-line summary, e.g. `"Found 2 files of 5 had crosswalk sounds."`.
    pub fn summary(&self) -> String {
        format!(
            "Found {} files of {} had crosswalk sounds.",
            self.found, self.audio_files
        )
    }

    fn record(&mut self, index: usize, path: PathBuf, result: Result<ClipOutcome, CrosswalkError>) {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                let outcome = classify(&err);
                warn!(path = %path.display(), error = %err, "clip not processed");
                self.errors.push(BatchError::clip(index, path.clone(), err));
                outcome
            }
        };

        match outcome {
            ClipOutcome::Found { .. } => {
                self.audio_files += 1;
                self.found += 1;
            }
            ClipOutcome::NotFound => self.audio_files += 1,
            ClipOutcome::Skipped => self.skipped += 1,
            ClipOutcome::Invalid => self.invalid += 1,
            ClipOutcome::Failed => self.failed += 1,
        }
        self.clips.push(ClipReport { path, outcome });
    }
}

fn classify(err: &CrosswalkError) -> ClipOutcome {
    match err {
        CrosswalkError::InvalidAudio { .. } | CrosswalkError::Decode(_) => ClipOutcome::Invalid,
        _ => ClipOutcome::Failed,
    }
}

/// Runs a [`Detector`] over every file of a directory.
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    detector: Detector,
}

impl BatchProcessor {
    /// Creates a processor around `detector`.
    pub const fn new(detector: Detector) -> Self {
        Self { detector }
    }

    /// The detector in use.
    pub const fn detector(&self) -> &Detector {
        &self.detector
    }

    /// Processes every regular file directly inside `dir`, appending labels to `sink`.
    ///
    /// # Errors
    ///
    /// Fails only if `dir` cannot be listed or the detector was cancelled.
    /// Per-file failures are recorded in the returned report.
    pub fn process_directory(&self, dir: &Path, sink: &mut dyn LabelSink) -> BatchResult<BatchReport> {
        let files = list_files(dir)?;
        let mut report = BatchReport::default();

        for (index, path) in files.into_iter().enumerate() {
            let result = self.process_file(&path, sink);
            if matches!(&result, Err(err) if err.is_cancelled()) {
                return Err(BatchError::Cancelled { processed: index });
            }
            report.record(index, path, result);
        }

        info!(
            dir = %dir.display(),
            audio_files = report.audio_files,
            found = report.found,
            skipped = report.skipped,
            invalid = report.invalid,
            failed = report.failed,
            "directory processed"
        );
        Ok(report)
    }

    /// Processes one file. A non-WAV path is reported as skipped.
    pub fn process_file(
        &self,
        path: &Path,
        sink: &mut dyn LabelSink,
    ) -> Result<ClipOutcome, CrosswalkError> {
        if !is_wav_file(path) {
            warn!(path = %path.display(), "not a wav file, skipping");
            return Ok(ClipOutcome::Skipped);
        }

        let audio = load_wav(path).map_err(|err| match err {
            CrosswalkError::Io(io) => CrosswalkError::Decode(io.to_string()),
            other => other,
        })?;
        let result = self.detector.label_clip(&audio, &clip_id(path), sink)?;
        Ok(outcome_of(&result))
    }
}

fn outcome_of(result: &DetectionResult) -> ClipOutcome {
    if result.found {
        ClipOutcome::Found {
            intervals: result.intervals.len(),
        }
    } else {
        ClipOutcome::NotFound
    }
}

fn list_files(dir: &Path) -> BatchResult<Vec<PathBuf>> {
    list_regular_files(dir).map_err(|source| BatchError::Directory {
        path: dir.to_path_buf(),
        source,
    })
}
