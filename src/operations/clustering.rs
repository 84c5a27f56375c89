//! One-dimensional mean-shift clustering of onset times.
//!
//! A single beep often yields several onsets a few frames apart. Mean shift
//! with a flat kernel merges them: every onset seeds a mode search, modes
//! closer than the bandwidth are merged (densest first) and each onset is
//! assigned to its nearest mode. The result is the mean onset time of each
//! cluster.

use super::types::ClusterConfig;
use crate::CrosswalkResult;
use tracing::trace;

const CONVERGENCE_FACTOR: f64 = 1e-3;

/// A converged mode and the number of points inside its bandwidth.
#[derive(Debug, Clone, Copy)]
struct Mode {
    centre: f64,
    support: usize,
}

fn seek_mode(points: &[f64], seed: f64, bandwidth: f64, max_iterations: usize) -> Option<Mode> {
    let threshold = CONVERGENCE_FACTOR * bandwidth;
    let mut centre = seed;
    let mut support = 0;

    for _ in 0..max_iterations {
        let (sum, count) = points
            .iter()
            .filter(|&&p| (p - centre).abs() <= bandwidth)
            .fold((0.0, 0usize), |(sum, count), &p| (sum + p, count + 1));
        if count == 0 {
            break;
        }
        let previous = centre;
        centre = sum / count as f64;
        support = count;
        if (centre - previous).abs() < threshold {
            break;
        }
    }

    (support > 0).then_some(Mode { centre, support })
}

/// Finds the cluster centres of `points` with flat-kernel mean shift.
///
/// Returns the converged modes after merging, ascending.
pub fn mean_shift_modes(points: &[f64], config: &ClusterConfig) -> CrosswalkResult<Vec<f64>> {
    config.validate()?;

    let mut modes: Vec<Mode> = points
        .iter()
        .filter_map(|&seed| seek_mode(points, seed, config.bandwidth, config.max_iterations))
        .collect();
    modes.sort_by(|a, b| b.support.cmp(&a.support).then(a.centre.total_cmp(&b.centre)));

    let mut kept: Vec<f64> = Vec::new();
    for mode in modes {
        if kept.iter().all(|&c| (c - mode.centre).abs() > config.bandwidth) {
            kept.push(mode.centre);
        }
    }
    kept.sort_by(f64::total_cmp);
    Ok(kept)
}

/// Clusters onset times and returns the mean time of each cluster, ascending.
///
/// Each onset joins the nearest mode; ties go to the earlier mode.
pub fn cluster_onsets(onsets: &[f64], config: &ClusterConfig) -> CrosswalkResult<Vec<f64>> {
    let modes = mean_shift_modes(onsets, config)?;
    if modes.is_empty() {
        return Ok(Vec::new());
    }

    let mut sums = vec![(0.0, 0usize); modes.len()];
    for &t in onsets {
        let nearest = modes
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - t).abs().total_cmp(&(b.1 - t).abs()))
            .map_or(0, |(idx, _)| idx);
        sums[nearest].0 += t;
        sums[nearest].1 += 1;
    }

    let mut centres: Vec<f64> = sums
        .into_iter()
        .filter(|&(_, count)| count > 0)
        .map(|(sum, count)| sum / count as f64)
        .collect();
    centres.sort_by(f64::total_cmp);

    trace!(onsets = onsets.len(), clusters = centres.len(), "onsets clustered");
    Ok(centres)
}
