//! Supporting types and configuration for the detection stages.
//!
//! Every tunable used by the pipeline lives in one of these small configuration
//! structs. Each provides a `new()` with the standard values, a `Default`
//! implementation that delegates to it, and a `validate()` that rejects values
//! outside the stage's domain.

use serde::{Deserialize, Serialize};

use crate::{CrosswalkResult, ParameterError};

/// Window functions available to the spectral front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WindowType {
    /// Rectangular window (no windowing).
    Rectangular,
    /// Periodic Hann window, the usual choice for overlap-add analysis/synthesis.
    #[default]
    Hanning,
}

impl WindowType {
    /// Generates `size` window coefficients.
    ///
    /// The Hann window is periodic (denominator `size`), which makes squared
    /// windows at a quarter-window hop sum to a constant.
    pub fn coefficients(self, size: usize) -> Vec<f64> {
        match self {
            WindowType::Rectangular => vec![1.0; size],
            WindowType::Hanning => (0..size)
                .map(|i| {
                    0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / size as f64).cos())
                })
                .collect(),
        }
    }
}

/// Configuration for the short-time Fourier transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StftConfig {
    /// Analysis window length in samples (also the FFT size).
    pub window_size: usize,
    /// Number of samples between successive frames.
    pub hop_size: usize,
    /// Window function.
    pub window: WindowType,
}

impl StftConfig {
    /// 1024-sample Hann window with a quarter-window hop.
    pub const fn new() -> Self {
        Self::with_window_size(1024)
    }

    /// Hann window of `window_size` samples with a quarter-window hop.
    pub const fn with_window_size(window_size: usize) -> Self {
        Self {
            window_size,
            hop_size: window_size / 4,
            window: WindowType::Hanning,
        }
    }

    /// Number of frequency bins produced for a real signal.
    pub const fn num_bins(&self) -> usize {
        self.window_size / 2 + 1
    }

    /// Validates the configuration.
    pub fn validate(&self) -> CrosswalkResult<()> {
        if self.window_size < 2 {
            return Err(ParameterError::invalid_value("window_size", "must be at least 2").into());
        }
        if self.hop_size == 0 {
            return Err(ParameterError::invalid_value("hop_size", "must be greater than 0").into());
        }
        if self.hop_size > self.window_size {
            return Err(ParameterError::invalid_value(
                "hop_size",
                "cannot be larger than window_size",
            )
            .into());
        }
        Ok(())
    }
}

impl Default for StftConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the nearest-neighbour foreground isolator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForegroundConfig {
    /// Minimum temporal distance between a frame and the frames it may be compared with.
    pub min_separation_seconds: f64,
    /// Margin applied to the background estimate in the soft mask.
    pub margin: f64,
    /// Exponent of the soft mask.
    pub power: f64,
    /// Number of neighbours aggregated per frame. `None` derives it from the
    /// number of admissible frames.
    pub neighbours: Option<usize>,
}

impl ForegroundConfig {
    /// Two-second separation, margin 10, power 2, automatic neighbour count.
    pub const fn new() -> Self {
        Self {
            min_separation_seconds: 2.0,
            margin: 10.0,
            power: 2.0,
            neighbours: None,
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> CrosswalkResult<()> {
        if !(self.min_separation_seconds.is_finite() && self.min_separation_seconds >= 0.0) {
            return Err(ParameterError::invalid_value(
                "min_separation_seconds",
                "must be finite and non-negative",
            )
            .into());
        }
        if !(self.margin.is_finite() && self.margin > 0.0) {
            return Err(ParameterError::invalid_value("margin", "must be positive").into());
        }
        if !(self.power.is_finite() && self.power > 0.0) {
            return Err(ParameterError::invalid_value("power", "must be positive").into());
        }
        if self.neighbours == Some(0) {
            return Err(ParameterError::invalid_value("neighbours", "must be at least 1").into());
        }
        Ok(())
    }
}

impl Default for ForegroundConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Peak picking parameters for onset detection.
///
/// Durations are expressed in seconds and converted to frames of the onset
/// envelope with `floor(seconds * sample_rate / hop_size)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakPickingConfig {
    /// Look-back span for the moving maximum.
    pub pre_max_seconds: f64,
    /// Look-ahead span for the moving maximum (one frame is always added).
    pub post_max_seconds: f64,
    /// Look-back span for the moving average.
    pub pre_avg_seconds: f64,
    /// Look-ahead span for the moving average (one frame is always added).
    pub post_avg_seconds: f64,
    /// Minimum margin above the moving average.
    pub delta: f64,
    /// Minimum spacing between consecutive peaks.
    pub wait_seconds: f64,
}

impl PeakPickingConfig {
    /// Standard onset peak picking: 30 ms maximum window, 100 ms averaging,
    /// delta 0.07, 30 ms wait.
    pub const fn new() -> Self {
        Self {
            pre_max_seconds: 0.03,
            post_max_seconds: 0.0,
            pre_avg_seconds: 0.10,
            post_avg_seconds: 0.10,
            delta: 0.07,
            wait_seconds: 0.03,
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> CrosswalkResult<()> {
        let spans = [
            ("pre_max_seconds", self.pre_max_seconds),
            ("post_max_seconds", self.post_max_seconds),
            ("pre_avg_seconds", self.pre_avg_seconds),
            ("post_avg_seconds", self.post_avg_seconds),
            ("wait_seconds", self.wait_seconds),
        ];
        for (name, value) in spans {
            if !(value.is_finite() && value >= 0.0) {
                return Err(
                    ParameterError::invalid_value(name, "must be finite and non-negative").into(),
                );
            }
        }
        if !self.delta.is_finite() {
            return Err(ParameterError::invalid_value("delta", "must be finite").into());
        }
        Ok(())
    }
}

impl Default for PeakPickingConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for onset detection on the reconstructed beep signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OnsetConfig {
    /// Analysis window for the onset-strength spectrogram.
    pub window_size: usize,
    /// Hop between onset-strength frames; also the unit of reported onsets.
    pub hop_size: usize,
    /// Dynamic range kept by the dB conversion.
    pub top_db: f64,
    /// Whether each detected peak is moved back to the preceding energy minimum.
    pub backtrack: bool,
    /// Peak picking parameters.
    pub peak_picking: PeakPickingConfig,
}

impl OnsetConfig {
    /// 2048-sample window, 512-sample hop, 80 dB range, backtracking enabled.
    pub const fn new() -> Self {
        Self {
            window_size: 2048,
            hop_size: 512,
            top_db: 80.0,
            backtrack: true,
            peak_picking: PeakPickingConfig::new(),
        }
    }

    /// Converts an onset-frame index to seconds.
    pub fn frame_to_seconds(&self, frame: usize, sample_rate: f64) -> f64 {
        crate::audio_math::frames_to_time(frame, sample_rate, self.hop_size)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> CrosswalkResult<()> {
        if self.window_size < 2 {
            return Err(ParameterError::invalid_value("onset.window_size", "must be at least 2").into());
        }
        if self.hop_size == 0 {
            return Err(ParameterError::invalid_value("onset.hop_size", "must be greater than 0").into());
        }
        if !(self.top_db.is_finite() && self.top_db > 0.0) {
            return Err(ParameterError::invalid_value("onset.top_db", "must be positive").into());
        }
        self.peak_picking.validate()
    }
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for 1-D mean-shift clustering of onset times.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Kernel radius in seconds.
    pub bandwidth: f64,
    /// Iteration cap for each seed.
    pub max_iterations: usize,
}

impl ClusterConfig {
    /// Bandwidth 0.5 s, 300 iterations.
    pub const fn new() -> Self {
        Self {
            bandwidth: 0.5,
            max_iterations: 300,
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> CrosswalkResult<()> {
        if !(self.bandwidth.is_finite() && self.bandwidth > 0.0) {
            return Err(ParameterError::invalid_value("bandwidth", "must be positive").into());
        }
        if self.max_iterations == 0 {
            return Err(
                ParameterError::invalid_value("max_iterations", "must be at least 1").into(),
            );
        }
        Ok(())
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stft_defaults() {
        let config = StftConfig::new();
        assert_eq!(config.window_size, 1024);
        assert_eq!(config.hop_size, 256);
        assert_eq!(config.num_bins(), 513);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_stft_validation() {
        let mut config = StftConfig::new();
        config.hop_size = 0;
        assert!(config.validate().is_err());

        config = StftConfig::new();
        config.hop_size = 2048;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hann_is_periodic() {
        let w = WindowType::Hanning.coefficients(8);
        assert_eq!(w[0], 0.0);
        assert!((w[4] - 1.0).abs() < 1e-12);
        // periodic: w[1] == w[7]
        assert!((w[1] - w[7]).abs() < 1e-12);
    }

    #[test]
    fn test_foreground_validation() {
        assert!(ForegroundConfig::new().validate().is_ok());

        let mut config = ForegroundConfig::new();
        config.margin = 0.0;
        assert!(config.validate().is_err());

        config = ForegroundConfig::new();
        config.neighbours = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_onset_and_cluster_validation() {
        assert!(OnsetConfig::new().validate().is_ok());
        assert!(ClusterConfig::new().validate().is_ok());

        let mut onset = OnsetConfig::new();
        onset.peak_picking.wait_seconds = -1.0;
        assert!(onset.validate().is_err());

        let mut cluster = ClusterConfig::new();
        cluster.bandwidth = 0.0;
        assert!(cluster.validate().is_err());
    }
}
