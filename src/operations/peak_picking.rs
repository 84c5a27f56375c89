//! Peak picking and backtracking for onset detection.
//!
//! ## Peak Picking
//!
//! A frame `n` of the onset-strength envelope `x` is a peak when
//!
//! 1. `x[n] == max(x[n - pre_max .. n + post_max])`
//! 2. `x[n] >= mean(x[n - pre_avg .. n + post_avg]) + delta`
//! 3. `n - previous_peak > wait`
//!
//! Windows are truncated at the envelope edges. Only strictly positive frames
//! can be peaks.
//!
//! ## Backtracking
//!
//! Peaks of a flux envelope lag behind the true start of an event. Each peak
//! is moved back to the nearest preceding local minimum of the envelope
//! (frame 0 counts as a minimum).

use crate::operations::types::PeakPickingConfig;
use crate::{CrosswalkResult, ParameterError};

/// Peak picking windows expressed in envelope frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakWindows {
    /// Frames before `n` in the moving maximum.
    pub pre_max: usize,
    /// Frames from `n` (inclusive) in the moving maximum.
    pub post_max: usize,
    /// Frames before `n` in the moving average.
    pub pre_avg: usize,
    /// Frames from `n` (inclusive) in the moving average.
    pub post_avg: usize,
    /// Minimum frame distance between accepted peaks.
    pub wait: usize,
}

impl PeakWindows {
    /// Converts the second-based `config` at `frame_rate` envelope frames per second.
    pub fn from_config(config: &PeakPickingConfig, frame_rate: f64) -> Self {
        let frames = |seconds: f64| (seconds * frame_rate).floor() as usize;
        Self {
            pre_max: frames(config.pre_max_seconds),
            post_max: frames(config.post_max_seconds) + 1,
            pre_avg: frames(config.pre_avg_seconds),
            post_avg: frames(config.post_avg_seconds) + 1,
            wait: frames(config.wait_seconds),
        }
    }
}

/// Scales an envelope to `[0, 1]` by subtracting its minimum and dividing by the
/// resulting maximum. A flat envelope becomes all zeros.
pub fn normalize_envelope(envelope: &[f64]) -> Vec<f64> {
    let min = envelope.iter().copied().fold(f64::INFINITY, f64::min);
    let shifted: Vec<f64> = envelope.iter().map(|&v| v - min).collect();
    let max = shifted.iter().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return vec![0.0; envelope.len()];
    }
    shifted.into_iter().map(|v| v / max).collect()
}

/// Picks peaks from an onset-strength envelope.
///
/// # Errors
///
/// Fails if the configuration is invalid.
pub fn pick_peaks(
    envelope: &[f64],
    config: &PeakPickingConfig,
    frame_rate: f64,
) -> CrosswalkResult<Vec<usize>> {
    config.validate()?;
    if !(frame_rate.is_finite() && frame_rate > 0.0) {
        return Err(ParameterError::invalid_value("frame_rate", "must be positive").into());
    }
    Ok(pick_peaks_with(envelope, PeakWindows::from_config(config, frame_rate), config.delta))
}

/// Peak picking with explicit frame windows.
pub fn pick_peaks_with(envelope: &[f64], windows: PeakWindows, delta: f64) -> Vec<usize> {
    let len = envelope.len();
    let mut peaks = Vec::new();
    let mut last_peak: Option<usize> = None;

    for (n, &value) in envelope.iter().enumerate() {
        if value <= 0.0 {
            continue;
        }

        let max_window = &envelope[n.saturating_sub(windows.pre_max)..(n + windows.post_max).min(len)];
        let local_max = max_window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if value != local_max {
            continue;
        }

        let avg_window = &envelope[n.saturating_sub(windows.pre_avg)..(n + windows.post_avg).min(len)];
        let local_mean = avg_window.iter().sum::<f64>() / avg_window.len() as f64;
        if value < local_mean + delta {
            continue;
        }

        if last_peak.is_none_or(|last| n > last + windows.wait) {
            peaks.push(n);
            last_peak = Some(n);
        }
    }

    peaks
}

/// Local minima of `energy`, always including frame 0.
fn local_minima(energy: &[f64]) -> Vec<usize> {
    let mut minima = vec![0];
    for m in 1..energy.len().saturating_sub(1) {
        if energy[m] <= energy[m - 1] && energy[m] < energy[m + 1] {
            minima.push(m);
        }
    }
    minima
}

/// Moves every event back to the closest local minimum of `energy` at or before it.
pub fn backtrack(events: &[usize], energy: &[f64]) -> Vec<usize> {
    let minima = local_minima(energy);
    events
        .iter()
        .map(|&event| {
            let idx = minima.partition_point(|&m| m <= event);
            minima[idx.saturating_sub(1)]
        })
        .collect()
}
