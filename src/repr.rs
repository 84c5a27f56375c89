//! Mono audio buffer representation.
//!
//! [`AudioSignal`] is the unit of input for the detection pipeline: an immutable
//! sequence of `f64` samples plus the native sample rate of the recording.

use crate::{CrosswalkError, CrosswalkResult};
use ndarray::{Array1, ArrayView1};

/// An immutable mono audio clip.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSignal {
    samples: Array1<f64>,
    sample_rate: u32,
}

impl AudioSignal {
    /// Creates a new mono signal from owned samples.
    pub const fn new_mono(samples: Array1<f64>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Creates a new mono signal by copying a slice.
    pub fn from_slice(samples: &[f64], sample_rate: u32) -> Self {
        Self::new_mono(Array1::from(samples.to_vec()), sample_rate)
    }

    /// Returns the sample rate in Hz.
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns a view over the samples.
    pub fn samples(&self) -> ArrayView1<'_, f64> {
        self.samples.view()
    }

    /// Returns the samples as a contiguous slice when possible.
    pub fn as_slice(&self) -> Option<&[f64]> {
        self.samples.as_slice()
    }

    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the signal holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / f64::from(self.sample_rate)
    }

    /// Checks that the buffer is usable audio.
    ///
    /// A valid clip has a non-zero sample rate and only finite samples.
    pub fn validate(&self) -> CrosswalkResult<()> {
        if self.sample_rate == 0 {
            return Err(CrosswalkError::invalid_audio("sample rate is zero"));
        }
        if let Some(pos) = self.samples.iter().position(|s| !s.is_finite()) {
            return Err(CrosswalkError::invalid_audio(format!(
                "non-finite sample at index {pos}"
            )));
        }
        Ok(())
    }

    /// Consumes the signal and returns the underlying samples.
    pub fn into_samples(self) -> Array1<f64> {
        self.samples
    }
}
