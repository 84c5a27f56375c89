//! Audio mathematics utilities and conversion functions.
//!
//! librosa-compatible helpers for the unit conversions the detection pipeline
//! needs: FFT bin frequencies, decibel/amplitude conversion and time/frame
//! conversion.
//!
//! # Examples
//!
//! ```rust
//! use crosswalk_label::audio_math::{db_to_amplitude, time_to_frames};
//!
//! let threshold = db_to_amplitude(-40.0); // 0.01
//! let frames = time_to_frames(1.0, 48000.0, 256); // 188
//! assert!((threshold - 0.01).abs() < 1e-12);
//! assert_eq!(frames, 188);
//! ```

// =============================================================================
// SPECTRAL HELPER FUNCTIONS
// =============================================================================

/// Generates the centre frequency of every bin of a real-valued FFT.
///
/// # Arguments
/// * `n_fft` - FFT size
/// * `sample_rate` - Sample rate in Hz
///
/// # Returns
/// `n_fft / 2 + 1` frequencies in Hz, from DC to Nyquist.
///
/// # Examples
///
/// ```rust
/// use crosswalk_label::audio_math::fft_frequencies;
///
/// let freqs = fft_frequencies(1024, 44100.0);
/// assert_eq!(freqs.len(), 513);
/// assert_eq!(freqs[0], 0.0);
/// assert_eq!(freqs[512], 22050.0);
/// ```
pub fn fft_frequencies(n_fft: usize, sample_rate: f64) -> Vec<f64> {
    let n_bins = n_fft / 2 + 1;
    let freq_resolution = sample_rate / n_fft as f64;

    (0..n_bins).map(|i| i as f64 * freq_resolution).collect()
}

// =============================================================================
// AMPLITUDE CONVERSIONS
// =============================================================================

/// Converts decibels to linear amplitude.
///
/// Uses the formula: `amplitude = 10^(dB / 20)`.
pub fn db_to_amplitude(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Converts a power value to decibels relative to `reference`.
///
/// `dB = 10 * log10(max(power, amin)) - 10 * log10(max(reference, amin))`
pub fn power_to_db(power: f64, reference: f64, amin: f64) -> f64 {
    10.0 * power.max(amin).log10() - 10.0 * reference.max(amin).log10()
}

/// Converts a power spectrum to dB in place, relative to its maximum and
/// floored at `max_db - top_db`.
pub fn power_spectrum_to_db(power: &mut ndarray::Array2<f64>, amin: f64, top_db: f64) {
    let reference = power.iter().copied().fold(0.0_f64, f64::max);
    power.mapv_inplace(|p| power_to_db(p, reference, amin));
    let floor = power.iter().copied().fold(f64::NEG_INFINITY, f64::max) - top_db;
    power.mapv_inplace(|db| db.max(floor));
}

// =============================================================================
// TIME/FRAME CONVERSIONS
// =============================================================================

/// Converts a frame index to time in seconds.
///
/// ```rust
/// use crosswalk_label::audio_math::frames_to_time;
///
/// let time = frames_to_time(100, 44100.0, 512); // ≈ 1.16 seconds
/// assert!((time - 1.161).abs() < 1e-3);
/// ```
pub fn frames_to_time(frame: usize, sample_rate: f64, hop_size: usize) -> f64 {
    (frame * hop_size) as f64 / sample_rate
}

/// Converts time in seconds to a frame index, rounded to the nearest frame.
pub fn time_to_frames(time_seconds: f64, sample_rate: f64, hop_size: usize) -> usize {
    if hop_size == 0 || !time_seconds.is_finite() || time_seconds <= 0.0 {
        return 0;
    }
    ((time_seconds * sample_rate) / hop_size as f64).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;
    use ndarray::array;

    #[test]
    fn test_db_to_amplitude() {
        assert_approx_eq!(db_to_amplitude(-40.0), 0.01, 1e-9);
        assert_approx_eq!(db_to_amplitude(0.0), 1.0, 1e-12);
        assert_approx_eq!(db_to_amplitude(-20.0), 0.1, 1e-9);
    }

    #[test]
    fn test_fft_frequencies_spacing() {
        let freqs = fft_frequencies(1024, 48000.0);
        assert_eq!(freqs.len(), 513);
        assert_approx_eq!(freqs[1], 46.875, 1e-12);
        assert_approx_eq!(freqs[54], 2531.25, 1e-12);
    }

    #[test]
    fn test_time_to_frames_rounds() {
        // 0.02667 s at 48 kHz is 1280 samples, i.e. five 256-sample hops.
        assert_eq!(time_to_frames(0.02667, 48000.0, 256), 5);
        assert_eq!(time_to_frames(1.01333, 48000.0, 256), 190);
        assert_eq!(time_to_frames(2.0, 48000.0, 256), 375);
        assert_eq!(time_to_frames(0.0, 48000.0, 256), 0);
        assert_eq!(time_to_frames(1.0, 48000.0, 0), 0);
    }

    #[test]
    fn test_frames_to_time_inverse() {
        let t = frames_to_time(time_to_frames(3.0, 16000.0, 512), 16000.0, 512);
        assert!((t - 3.0).abs() < 512.0 / 16000.0);
    }

    #[test]
    fn test_power_spectrum_to_db_floor() {
        let mut power = array![[1.0, 1e-12], [0.1, 0.0]];
        power_spectrum_to_db(&mut power, 1e-10, 80.0);
        assert_eq!(power[[0, 0]], 0.0);
        assert_eq!(power[[0, 1]], -80.0);
        assert_eq!(power[[1, 1]], -80.0);
        assert!((power[[1, 0]] + 10.0).abs() < 1e-9);
    }
}
