// Correctness and logic
#![warn(clippy::unit_cmp)] // Detects comparing unit types
#![warn(clippy::match_same_arms)] // Duplicate match arms

// Performance-focused
#![warn(clippy::inefficient_to_string)] // `format!("{}", x)` vs `x.to_string()`
#![warn(clippy::map_clone)] // Cloning inside `map()` unnecessarily
#![warn(clippy::unnecessary_to_owned)] // Detects redundant `.to_owned()` or `.clone()`
#![warn(clippy::large_stack_arrays)] // Helps avoid stack overflows
#![warn(clippy::needless_collect)] // Avoids `.collect().iter()` chains

// Style and idiomatic Rust
#![warn(clippy::redundant_clone)] // Detects unnecessary `.clone()`
#![warn(clippy::identity_op)] // e.g., `x + 0`, `x * 1`
#![warn(clippy::needless_return)] // Avoids `return` at the end of functions
#![warn(clippy::manual_map)] // Use `.map()` instead of manual `match`
#![warn(clippy::unwrap_used)] // Avoids using `unwrap()`

// Maintainability
#![warn(clippy::missing_panics_doc)] // Docs for functions that might panic
#![deny(missing_docs)] // Documentation is a must for release

//! # crosswalk_label
//!
//! Offline detection and labelling of crosswalk audio-beacon beeps.
//!
//! A pedestrian crossing beacon emits a short tone at a fixed period. This
//! crate scans recorded clips for that pattern and writes one label line per
//! detected beep:
//!
//! ```text
//! 1013 1040 crosswalk
//! ```
//!
//! ## Pipeline
//!
//! 1. **Spectrogram**: STFT with a 1024-sample Hann window, quarter-window hop
//! 2. **Foreground isolation**: nearest-neighbour background estimate and soft mask
//! 3. **Band isolation**: keep the 2500-2800 Hz rows, drop cells under -40 dB
//! 4. **Pulse validation**: runs of the beep duration with a partner one period away
//! 5. **Onset clustering**: resynthesise, detect onsets, merge them by mean shift
//! 6. **Labelling**: one millisecond interval per cluster, appended to the clip's label file
//!
//! ## Features
//!
//! - `random-generation` (default): white-noise generator for calibration clips (`rand`)
//! - `parallel-processing`: process the clips of a directory on a rayon pool
//! - `progress-tracking`: `indicatif` progress bar reporter
//!
//! ## Error Handling
//!
//! ```rust
//! use crosswalk_label::{CrosswalkError, CrosswalkResult, ParameterError};
//!
//! let result: CrosswalkResult<()> = Err(CrosswalkError::Parameter(
//!     ParameterError::invalid_value("beep_period_seconds", "must be positive"),
//! ));
//!
//! match result {
//!     Ok(()) => {}
//!     Err(CrosswalkError::InvalidAudio { reason }) => eprintln!("skipping clip: {reason}"),
//!     Err(CrosswalkError::Parameter(err)) => eprintln!("bad configuration: {err}"),
//!     Err(other) => eprintln!("error: {other}"),
//! }
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use crosswalk_label::{Detector, DetectorConfig, MemoryLabelSink, silence};
//! use std::time::Duration;
//!
//! # fn main() -> crosswalk_label::CrosswalkResult<()> {
//! let detector = Detector::new(DetectorConfig::new())?;
//! let clip = silence(Duration::from_secs(1), 48000);
//!
//! let mut sink = MemoryLabelSink::new();
//! let result = detector.label_clip(&clip, "clip", &mut sink)?;
//! assert!(!result.found);
//! assert!(sink.lines("clip").is_none());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod detector;
mod error;
pub mod io;
pub mod labels;
pub mod operations;
pub mod progress;
mod repr;
pub mod utils;

pub use batch::{BatchError, BatchProcessor, BatchReport, BatchResult, ClipOutcome, ClipReport};
pub use detector::{DetectionResult, DetectionState, Detector, DetectorConfig};
pub use error::{CrosswalkError, CrosswalkResult, ParameterError};
pub use io::{clip_id, is_wav_file, list_regular_files, load_wav};
pub use labels::{FileLabelSink, LabelSink, LabeledInterval, MemoryLabelSink};
pub use operations::*;
pub use progress::{
    CallbackProgress, CancellationToken, NoProgress, ProgressReporter, Stage, StageProgress,
    TracingProgress,
};
pub use repr::AudioSignal;
pub use utils::audio_math;
pub use utils::generation::*;
