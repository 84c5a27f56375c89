//! Spectral analysis operations used by the detection pipeline.
//!
//! Each stage of the pipeline lives in its own module and operates on a
//! [`SpectralMatrix`] or on plain onset data, so stages can be tested and
//! reused independently.
//!
//! ## Module Organization
//!
//! - [`traits`] - Core trait definitions ([`AudioTransforms`], [`AudioOnsets`])
//! - [`types`] - Configuration types
//! - [`transforms`] - STFT / inverse STFT
//! - [`foreground`] - Nearest-neighbour foreground isolation
//! - [`bands`] - Frequency band isolation
//! - [`pulses`] - Pulse duration and period validation
//! - [`peak_picking`] - Envelope peak picking and backtracking
//! - [`onset_detection`] - Spectral-flux onset detection
//! - [`clustering`] - Mean-shift clustering of onset times
//!
//! ## Quick Start
//!
//! ```rust
//! use crosswalk_label::operations::*;
//! use crosswalk_label::sine_wave;
//! use std::time::Duration;
//!
//! # fn example() -> crosswalk_label::CrosswalkResult<()> {
//! let audio = sine_wave(2650.0, Duration::from_millis(500), 48000, 0.5);
//! let spec = audio.stft(&StftConfig::new())?;
//! let isolation = isolate_bands(spec, &[FrequencyBand::new(2500.0, 2800.0)], None)?;
//! assert_eq!(isolation.rows, vec![54, 55, 56, 57, 58, 59]);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod traits;
pub mod types;

pub mod bands;
pub mod clustering;
pub mod foreground;
pub mod onset_detection;
pub mod peak_picking;
pub mod pulses;
pub mod transforms;

pub use traits::{AudioOnsets, AudioTransforms};

pub use bands::{BandIsolation, FrequencyBand, band_bins, isolate_bands};
pub use clustering::{cluster_onsets, mean_shift_modes};
pub use foreground::{isolate_foreground, isolate_foreground_with, soft_mask};
pub use pulses::{
    PulseInterval, PulseTiming, PulseValidation, RowSurvivors, validate_duration, validate_period,
    validate_rows,
};
pub use transforms::SpectralMatrix;
pub use types::{
    ClusterConfig, ForegroundConfig, OnsetConfig, PeakPickingConfig, StftConfig, WindowType,
};
