//! Core trait definitions for the analysis operations.

use super::transforms::SpectralMatrix;
use super::types::{OnsetConfig, StftConfig};
use crate::CrosswalkResult;

/// Spectral analysis of an audio buffer.
pub trait AudioTransforms {
    /// Computes the short-time Fourier transform of the signal.
    ///
    /// Frames are centred: the signal is zero-padded by `window_size / 2` on
    /// both ends, so frame `t` is centred on sample `t * hop_size`.
    ///
    /// # Returns
    ///
    /// A [`SpectralMatrix`] with `window_size / 2 + 1` bins and
    /// `1 + len / hop_size` frames (no frames for an empty signal).
    fn stft(&self, config: &StftConfig) -> CrosswalkResult<SpectralMatrix>;
}

/// Onset analysis of an audio buffer.
pub trait AudioOnsets {
    /// Computes the onset-strength envelope, one value per onset frame.
    fn onset_strength(&self, config: &OnsetConfig) -> CrosswalkResult<Vec<f64>>;

    /// Detects onsets and returns their times in seconds, ascending.
    fn detect_onsets(&self, config: &OnsetConfig) -> CrosswalkResult<Vec<f64>>;
}
