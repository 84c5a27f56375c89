//! Pulse duration and period validation.
//!
//! Each band row is reduced to the frames where it is active. Maximal runs of
//! consecutive active frames are pulses; a pulse must last about one beep
//! (`[D, 2D)` frames) and must have a partner pulse roughly one beep period
//! away (`P ± V` frames, either direction). Only frames of pulses that pass
//! both checks survive.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::bands::BandIsolation;
use super::transforms::SpectralMatrix;
use crate::{CrosswalkResult, ParameterError};
use ndarray::Array2;
use tracing::debug;

/// A run of active frames in one bin, `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseInterval {
    /// First active frame.
    pub start: usize,
    /// Last active frame.
    pub end: usize,
}

impl PulseInterval {
    /// Creates an interval; `end` must not precede `start`.
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of frames in the run.
    pub const fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Always false: a run holds at least one frame.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Temporal centre of the run in frames.
    pub fn centre(&self) -> f64 {
        (self.start + self.end) as f64 / 2.0
    }

    /// Frames retained for a periodic pulse: `start..end`, end excluded.
    pub fn frames(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// Beep timing expressed in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseTiming {
    /// Expected pulse length `D`.
    pub duration: usize,
    /// Expected centre-to-centre spacing `P`.
    pub period: usize,
    /// Allowed deviation from the period `V`.
    pub tolerance: usize,
}

impl PulseTiming {
    /// Validates the timing.
    pub fn validate(&self) -> CrosswalkResult<()> {
        if self.duration == 0 {
            return Err(ParameterError::invalid_value(
                "beep_duration",
                "must span at least one frame",
            )
            .into());
        }
        if self.period == 0 {
            return Err(ParameterError::invalid_value(
                "beep_period",
                "must span at least one frame",
            )
            .into());
        }
        Ok(())
    }
}

/// Splits ascending frame indices into maximal runs of consecutive frames.
pub fn find_runs(active_frames: &[usize]) -> Vec<PulseInterval> {
    let mut runs = Vec::new();
    let mut iter = active_frames.iter().copied();
    let Some(first) = iter.next() else {
        return runs;
    };

    let mut current = PulseInterval::new(first, first);
    for frame in iter {
        if frame == current.end + 1 {
            current.end = frame;
        } else {
            runs.push(current);
            current = PulseInterval::new(frame, frame);
        }
    }
    runs.push(current);
    runs
}

/// Keeps the runs whose length lies in `[duration, 2 * duration)`.
///
/// Runs outside the window are dropped whole, never trimmed.
pub fn validate_duration(active_frames: &[usize], duration: usize) -> Vec<PulseInterval> {
    find_runs(active_frames)
        .into_iter()
        .filter(|run| run.len() >= duration && run.len() < 2 * duration)
        .collect()
}

/// Frames of every pulse that has a partner `period ± tolerance` frames away.
///
/// Both directions are checked; one partner in either direction is enough.
/// Fewer than two pulses can never produce a survivor. The result is sorted
/// and free of duplicates.
pub fn validate_period(pulses: &[PulseInterval], period: usize, tolerance: usize) -> Vec<usize> {
    if pulses.len() < 2 {
        return Vec::new();
    }

    let centres: Vec<f64> = pulses.iter().map(PulseInterval::centre).collect();
    let (period, tolerance) = (period as f64, tolerance as f64);
    let near = |value: f64, target: f64| (value - target).abs() <= tolerance;

    let mut survivors = BTreeSet::new();
    for (i, pulse) in pulses.iter().enumerate() {
        let centre = centres[i];
        let periodic = centres.iter().enumerate().any(|(j, &other)| {
            j != i && (near(other, centre - period) || near(other, centre + period))
        });
        if periodic {
            survivors.extend(pulse.frames());
        }
    }
    survivors.into_iter().collect()
}

/// Surviving frames of one band row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSurvivors {
    /// Bin index.
    pub bin: usize,
    /// Pulses that passed the duration check.
    pub pulses: Vec<PulseInterval>,
    /// Frames of the pulses that also passed the period check.
    pub frames: Vec<usize>,
}

/// Output of [`validate_rows`].
#[derive(Debug, Clone, PartialEq)]
pub struct PulseValidation {
    /// Matrix holding only surviving cells of the band rows.
    pub spec: SpectralMatrix,
    /// Per-row validation detail, in row order.
    pub rows: Vec<RowSurvivors>,
}

impl PulseValidation {
    /// True when any row kept at least one frame.
    pub fn found(&self) -> bool {
        self.rows.iter().any(|row| !row.frames.is_empty())
    }

    /// Total number of surviving cells.
    pub fn surviving_cells(&self) -> usize {
        self.rows.iter().map(|row| row.frames.len()).sum()
    }
}

/// Runs duration and period validation on every band row of `isolation`.
///
/// The returned matrix is zero everywhere except the surviving frames of band
/// rows, which keep their magnitudes.
pub fn validate_rows(isolation: BandIsolation, timing: &PulseTiming) -> CrosswalkResult<PulseValidation> {
    timing.validate()?;

    let BandIsolation { spec, rows } = isolation;
    let mut validated = Array2::zeros(spec.magnitude().dim());
    let mut details = Vec::with_capacity(rows.len());

    for bin in rows {
        let row = spec.magnitude().row(bin);
        let active: Vec<usize> = row
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v != 0.0)
            .map(|(frame, _)| frame)
            .collect();

        let pulses = validate_duration(&active, timing.duration);
        let frames = validate_period(&pulses, timing.period, timing.tolerance);
        for &frame in &frames {
            validated[[bin, frame]] = row[frame];
        }
        details.push(RowSurvivors { bin, pulses, frames });
    }

    let validation = PulseValidation {
        spec: spec.with_magnitude(validated)?,
        rows: details,
    };
    debug!(
        found = validation.found(),
        cells = validation.surviving_cells(),
        "pulse validation"
    );
    Ok(validation)
}
