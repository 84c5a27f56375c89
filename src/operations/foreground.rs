//! Foreground isolation by nearest-neighbour filtering and soft masking.
//!
//! Repeating background texture is estimated frame by frame from the most
//! similar frames elsewhere in the clip; what the estimate cannot explain is
//! kept as foreground. Short, sparse events such as beacon beeps have no close
//! match at a distance and survive, while steady ambience is masked away.
//!
//! ## Algorithm Overview
//!
//! 1. For every frame, rank all frames at least `min_separation_seconds` away
//!    by cosine similarity of their magnitude spectra
//! 2. Take the per-bin median of the `k` most similar frames as the
//!    background estimate
//! 3. Clamp the estimate to the original magnitude (pointwise minimum)
//! 4. Build a soft mask `R^p / (R^p + (margin * B)^p)` from the residual
//!    `R = S - B` and the background `B`
//! 5. Multiply the original magnitude by the mask; phase is carried through
//!
//! The neighbour count defaults to `2 * ceil(sqrt(frames - 2 * width + 1))`.

use super::transforms::SpectralMatrix;
use super::types::ForegroundConfig;
use crate::utils::audio_math::time_to_frames;
use crate::CrosswalkResult;
use ndarray::{Array1, Array2, Axis};
use tracing::debug;

/// Isolates the foreground of a magnitude spectrogram.
///
/// Equivalent to [`isolate_foreground_with`] with a no-op frame callback.
pub fn isolate_foreground(
    spec: SpectralMatrix,
    config: &ForegroundConfig,
) -> CrosswalkResult<SpectralMatrix> {
    isolate_foreground_with(spec, config, |_, _| Ok(()))
}

/// Isolates the foreground, calling `on_frame(done, total)` after each frame of
/// the similarity search.
///
/// Returning an error from the callback aborts the search and propagates the
/// error, which is how callers implement cancellation.
pub fn isolate_foreground_with<C>(
    spec: SpectralMatrix,
    config: &ForegroundConfig,
    mut on_frame: C,
) -> CrosswalkResult<SpectralMatrix>
where
    C: FnMut(usize, usize) -> CrosswalkResult<()>,
{
    config.validate()?;

    let width = time_to_frames(
        config.min_separation_seconds,
        f64::from(spec.sample_rate()),
        spec.config().hop_size,
    )
    .max(1);

    let background = nearest_neighbour_filter(spec.magnitude(), width, config.neighbours, &mut on_frame)?;
    let background = ndarray::Zip::from(&background)
        .and(spec.magnitude())
        .map_collect(|&b, &s| b.min(s));

    let mask = soft_mask(spec.magnitude(), &background, config.margin, config.power);
    let foreground = &mask * spec.magnitude();

    debug!(
        frames = spec.num_frames(),
        width,
        kept = foreground.iter().filter(|&&v| v > 0.0).count(),
        "foreground isolated"
    );

    spec.with_magnitude(foreground)
}

/// Default neighbour count for `frames` frames and an exclusion `width`.
pub fn default_neighbour_count(frames: usize, width: usize) -> usize {
    let admissible = (frames as i64 - 2 * width as i64 + 1).max(1) as f64;
    2 * admissible.sqrt().ceil() as usize
}

/// Replaces every frame with the per-bin median of its most similar distant frames.
///
/// Frames closer than `width` to the query frame are never considered. A frame
/// with no admissible neighbour keeps its own values.
pub fn nearest_neighbour_filter<C>(
    magnitude: &Array2<f64>,
    width: usize,
    neighbours: Option<usize>,
    on_frame: &mut C,
) -> CrosswalkResult<Array2<f64>>
where
    C: FnMut(usize, usize) -> CrosswalkResult<()>,
{
    let (num_bins, num_frames) = magnitude.dim();
    let mut filtered = magnitude.clone();
    if num_frames == 0 {
        return Ok(filtered);
    }

    let k = neighbours.unwrap_or_else(|| default_neighbour_count(num_frames, width));

    // Unit-norm columns; all-zero frames stay zero and so have similarity 0.
    let norms: Array1<f64> = magnitude.map_axis(Axis(0), |col| col.dot(&col).sqrt());
    let mut normalized = magnitude.clone();
    for (mut col, &norm) in normalized.axis_iter_mut(Axis(1)).zip(norms.iter()) {
        if norm > 0.0 {
            col /= norm;
        }
    }

    let mut ranked: Vec<(f64, usize)> = Vec::with_capacity(num_frames);
    let mut values: Vec<f64> = Vec::with_capacity(k);

    for frame in 0..num_frames {
        on_frame(frame, num_frames)?;

        if norms[frame] == 0.0 {
            continue;
        }

        let similarity = normalized.t().dot(&normalized.column(frame));
        ranked.clear();
        ranked.extend(
            (0..num_frames)
                .filter(|&j| frame.abs_diff(j) >= width)
                .map(|j| (similarity[j], j)),
        );
        if ranked.is_empty() {
            continue;
        }
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        ranked.truncate(k);

        for bin in 0..num_bins {
            values.clear();
            values.extend(ranked.iter().map(|&(_, j)| magnitude[[bin, j]]));
            filtered[[bin, frame]] = median(&mut values);
        }
    }
    on_frame(num_frames, num_frames)?;

    Ok(filtered)
}

/// Median of a non-empty slice; the mean of the two middle values for even lengths.
fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}

/// Soft mask weighting `spectrum - background` against `margin * background`.
///
/// Cells where both terms vanish get weight 0. All weights lie in `[0, 1]`.
pub fn soft_mask(
    spectrum: &Array2<f64>,
    background: &Array2<f64>,
    margin: f64,
    power: f64,
) -> Array2<f64> {
    ndarray::Zip::from(spectrum)
        .and(background)
        .map_collect(|&s, &b| {
            let residual = (s - b).max(0.0);
            let reference = margin * b;
            let scale = residual.max(reference);
            if scale <= f64::MIN_POSITIVE {
                return 0.0;
            }
            let x = (residual / scale).powf(power);
            let r = (reference / scale).powf(power);
            x / (x + r)
        })
}
