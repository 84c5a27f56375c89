//! Frequency band isolation.
//!
//! Keeps only the spectrogram rows whose centre frequency falls inside one of
//! the configured bands and optionally drops cells quieter than an amplitude
//! threshold. The surviving row indices are returned alongside the matrix;
//! they are the rows the pulse validators inspect.

use serde::{Deserialize, Serialize};

use super::transforms::SpectralMatrix;
use crate::{CrosswalkResult, ParameterError};
use ndarray::Array2;
use tracing::debug;

/// A frequency range in Hz, inclusive on both ends.
///
/// A band with a negative edge is the disabled sentinel and is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    /// Lower edge in Hz.
    pub low_hz: f64,
    /// Upper edge in Hz.
    pub high_hz: f64,
}

impl FrequencyBand {
    /// Placeholder slot that selects nothing.
    pub const DISABLED: Self = Self {
        low_hz: -1.0,
        high_hz: -1.0,
    };

    /// Creates a band from `low_hz` to `high_hz`.
    pub const fn new(low_hz: f64, high_hz: f64) -> Self {
        Self { low_hz, high_hz }
    }

    /// True for the disabled sentinel.
    pub fn is_disabled(&self) -> bool {
        self.low_hz < 0.0 || self.high_hz < 0.0
    }

    /// Centre of the band in Hz.
    pub fn centre_hz(&self) -> f64 {
        (self.low_hz + self.high_hz) / 2.0
    }

    /// Checks that an enabled band is finite and ordered.
    pub fn validate(&self) -> CrosswalkResult<()> {
        if self.is_disabled() {
            return Ok(());
        }
        if !(self.low_hz.is_finite() && self.high_hz.is_finite()) {
            return Err(ParameterError::invalid_value("band", "edges must be finite").into());
        }
        if self.low_hz > self.high_hz {
            return Err(ParameterError::invalid_value(
                "band",
                format!("low edge {} Hz exceeds high edge {} Hz", self.low_hz, self.high_hz),
            )
            .into());
        }
        Ok(())
    }

    /// Bin indices covered by this band.
    ///
    /// Every bin whose centre lies in `[low_hz, high_hz]` is selected. A band
    /// that lies inside the spectrum but between two bin centres selects the
    /// bin nearest to its centre.
    pub fn bins(&self, bin_frequencies: &[f64]) -> Vec<usize> {
        if self.is_disabled() || bin_frequencies.is_empty() {
            return Vec::new();
        }

        let inside: Vec<usize> = bin_frequencies
            .iter()
            .enumerate()
            .filter(|&(_, &f)| f >= self.low_hz && f <= self.high_hz)
            .map(|(bin, _)| bin)
            .collect();
        if !inside.is_empty() {
            return inside;
        }

        let nyquist = bin_frequencies[bin_frequencies.len() - 1];
        if self.high_hz < bin_frequencies[0] || self.low_hz > nyquist {
            return Vec::new();
        }
        let centre = self.centre_hz();
        bin_frequencies
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - centre).abs().total_cmp(&(b.1 - centre).abs()))
            .map(|(bin, _)| vec![bin])
            .unwrap_or_default()
    }
}

impl std::fmt::Display for FrequencyBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_disabled() {
            write!(f, "disabled")
        } else {
            write!(f, "{}-{} Hz", self.low_hz, self.high_hz)
        }
    }
}

impl std::str::FromStr for FrequencyBand {
    type Err = ParameterError;

    /// Parses `LOW:HIGH` (also accepts `LOW-HIGH`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (low, high) = s
            .split_once(':')
            .or_else(|| s.split_once('-'))
            .ok_or_else(|| ParameterError::invalid_value("band", format!("expected LOW:HIGH, got '{s}'")))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| ParameterError::invalid_value("band", format!("'{v}': {e}")))
        };
        let band = Self::new(parse(low)?, parse(high)?);
        if band.is_disabled() || band.low_hz > band.high_hz {
            return Err(ParameterError::invalid_value(
                "band",
                format!("'{s}' must satisfy 0 <= LOW <= HIGH"),
            ));
        }
        Ok(band)
    }
}

/// Sorted, deduplicated bins covered by any of `bands`.
pub fn band_bins(bands: &[FrequencyBand], bin_frequencies: &[f64]) -> Vec<usize> {
    let mut rows: Vec<usize> = bands.iter().flat_map(|band| band.bins(bin_frequencies)).collect();
    rows.sort_unstable();
    rows.dedup();
    rows
}

/// Output of [`isolate_bands`].
#[derive(Debug, Clone, PartialEq)]
pub struct BandIsolation {
    /// Matrix with every cell outside the bands (or under the threshold) set to zero.
    pub spec: SpectralMatrix,
    /// Rows that fall inside the configured bands, ascending.
    pub rows: Vec<usize>,
}

/// Zeroes every cell outside `bands` and, when `amplitude_threshold` is set,
/// every cell whose magnitude is below it.
///
/// An empty or fully disabled band list yields an all-zero matrix and no rows.
pub fn isolate_bands(
    spec: SpectralMatrix,
    bands: &[FrequencyBand],
    amplitude_threshold: Option<f64>,
) -> CrosswalkResult<BandIsolation> {
    for band in bands {
        band.validate()?;
    }

    let rows = band_bins(bands, &spec.bin_frequencies());
    let mut banded = Array2::zeros(spec.magnitude().dim());
    for &row in &rows {
        banded.row_mut(row).assign(&spec.magnitude().row(row));
    }
    if let Some(threshold) = amplitude_threshold {
        banded.mapv_inplace(|v| if v < threshold { 0.0 } else { v });
    }

    debug!(
        rows = rows.len(),
        active = banded.iter().filter(|&&v| v > 0.0).count(),
        "band isolation"
    );

    Ok(BandIsolation {
        spec: spec.with_magnitude(banded)?,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_math::fft_frequencies;
    use crate::operations::traits::AudioTransforms;
    use crate::operations::types::StftConfig;
    use crate::utils::generation::sine_wave;
    use std::time::Duration;

    #[test]
    fn test_default_band_bins_at_48k() {
        let freqs = fft_frequencies(1024, 48000.0);
        let rows = band_bins(
            &[FrequencyBand::DISABLED, FrequencyBand::new(2500.0, 2800.0)],
            &freqs,
        );
        assert_eq!(rows, vec![54, 55, 56, 57, 58, 59]);
    }

    #[test]
    fn test_narrow_band_uses_nearest_bin() {
        let freqs = fft_frequencies(1024, 48000.0);
        // 2540..2545 Hz falls between bins 54 (2531.25) and 55 (2578.125)
        assert_eq!(FrequencyBand::new(2540.0, 2545.0).bins(&freqs), vec![54]);
        // above Nyquist
        assert!(FrequencyBand::new(30000.0, 31000.0).bins(&freqs).is_empty());
    }

    #[test]
    fn test_overlapping_bands_dedup() {
        let freqs = fft_frequencies(1024, 48000.0);
        let rows = band_bins(
            &[FrequencyBand::new(2500.0, 2700.0), FrequencyBand::new(2600.0, 2800.0)],
            &freqs,
        );
        assert_eq!(rows, vec![54, 55, 56, 57, 58, 59]);
    }

    #[test]
    fn test_band_parse() {
        let band: FrequencyBand = "2500:2800".parse().unwrap();
        assert_eq!(band, FrequencyBand::new(2500.0, 2800.0));
        assert!("2800:2500".parse::<FrequencyBand>().is_err());
        assert!("abc".parse::<FrequencyBand>().is_err());
        assert_eq!(band.to_string(), "2500-2800 Hz");
    }

    #[test]
    fn test_validate_rejects_inverted_band() {
        assert!(FrequencyBand::new(3000.0, 2000.0).validate().is_err());
        assert!(FrequencyBand::DISABLED.validate().is_ok());
    }

    #[test]
    fn test_isolate_zeroes_outside_rows() {
        let audio = sine_wave(1000.0, Duration::from_millis(200), 48000, 0.5);
        let spec = audio.stft(&StftConfig::new()).unwrap();
        let isolation = isolate_bands(spec, &[FrequencyBand::new(2500.0, 2800.0)], None).unwrap();

        let magnitude = isolation.spec.magnitude();
        for (bin, row) in magnitude.rows().into_iter().enumerate() {
            if !isolation.rows.contains(&bin) {
                assert!(row.iter().all(|&v| v == 0.0));
            }
        }
        // leakage from the 1 kHz tone is still present in-band before thresholding
        assert!(isolation.rows.iter().any(|&r| magnitude.row(r).iter().any(|&v| v > 0.0)));
    }

    #[test]
    fn test_threshold_zeroes_quiet_cells() {
        let audio = sine_wave(2650.0, Duration::from_millis(200), 48000, 0.5);
        let spec = audio.stft(&StftConfig::new()).unwrap();
        let isolation =
            isolate_bands(spec, &[FrequencyBand::new(2500.0, 2800.0)], Some(1.0)).unwrap();
        assert!(isolation.spec.magnitude().iter().all(|&v| v == 0.0 || v >= 1.0));
    }

    #[test]
    fn test_empty_band_configuration() {
        let audio = sine_wave(2650.0, Duration::from_millis(100), 48000, 0.5);
        let spec = audio.stft(&StftConfig::new()).unwrap();
        let isolation = isolate_bands(spec, &[FrequencyBand::DISABLED], None).unwrap();
        assert!(isolation.rows.is_empty());
        assert!(isolation.spec.magnitude().iter().all(|&v| v == 0.0));
    }
}
