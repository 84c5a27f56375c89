//! Onset detection on the reconstructed beep signal.
//!
//! ## Onset Strength
//!
//! The onset-strength envelope is the mean positive spectral flux of the
//! dB-scaled power spectrogram:
//!
//! ```text
//! ODF[n] = mean_k(max(0, S_dB[k,n] - S_dB[k,n-1]))
//! ```
//!
//! with `S_dB` referenced to the spectrogram maximum and floored `top_db`
//! below it, so silence contributes no flux. `ODF[0] = 0`.
//!
//! ## Detection
//!
//! The envelope is normalised to `[0, 1]`, peaks are picked (see
//! [`super::peak_picking`]) and, when `backtrack` is enabled, moved back to
//! the preceding envelope minimum so the reported time marks the start of
//! the event rather than its steepest rise.

use super::peak_picking::{backtrack, normalize_envelope, pick_peaks};
use super::traits::{AudioOnsets, AudioTransforms};
use super::types::{OnsetConfig, StftConfig, WindowType};
use crate::utils::audio_math::power_spectrum_to_db;
use crate::{AudioSignal, CrosswalkResult};

const AMIN: f64 = 1e-10;

impl AudioOnsets for AudioSignal {
    fn onset_strength(&self, config: &OnsetConfig) -> CrosswalkResult<Vec<f64>> {
        config.validate()?;
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let stft_config = StftConfig {
            window_size: config.window_size,
            hop_size: config.hop_size,
            window: WindowType::Hanning,
        };
        let spec = self.stft(&stft_config)?;
        let mut power = spec.magnitude().mapv(|m| m * m);
        power_spectrum_to_db(&mut power, AMIN, config.top_db);

        let (num_bins, num_frames) = power.dim();
        let mut odf = Vec::with_capacity(num_frames);
        odf.push(0.0);

        for frame in 1..num_frames {
            let flux: f64 = (0..num_bins)
                .map(|bin| (power[[bin, frame]] - power[[bin, frame - 1]]).max(0.0))
                .sum();
            odf.push(flux / num_bins as f64);
        }

        Ok(odf)
    }

    fn detect_onsets(&self, config: &OnsetConfig) -> CrosswalkResult<Vec<f64>> {
        let odf = self.onset_strength(config)?;
        let envelope = normalize_envelope(&odf);
        if envelope.iter().all(|&v| v == 0.0) {
            return Ok(Vec::new());
        }

        let sample_rate = f64::from(self.sample_rate());
        let frame_rate = sample_rate / config.hop_size as f64;
        let mut frames = pick_peaks(&envelope, &config.peak_picking, frame_rate)?;
        if config.backtrack {
            frames = backtrack(&frames, &envelope);
        }

        Ok(frames
            .into_iter()
            .map(|frame| config.frame_to_seconds(frame, sample_rate))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::generation::{PulseTrain, silence};
    use std::time::Duration;

    fn bursts(offset: f64, period: f64, count: usize) -> AudioSignal {
        PulseTrain {
            frequency: 2650.0,
            pulse_seconds: 0.03,
            period_seconds: period,
            count,
            offset_seconds: offset,
            amplitude: 0.5,
        }
        .render(Duration::from_secs(4), 48000)
    }

    #[test]
    fn test_onset_strength_is_non_negative() {
        let audio = bursts(0.5, 1.0, 3);
        let odf = audio.onset_strength(&OnsetConfig::new()).unwrap();

        assert_eq!(odf.len(), 1 + audio.len() / 512);
        assert_eq!(odf[0], 0.0);
        assert!(odf.iter().all(|&v| v >= 0.0));
        assert!(odf.iter().any(|&v| v > 0.0));
    }

    #[test]
    fn test_onsets_near_each_burst() {
        let audio = bursts(0.5, 1.0, 3);
        let onsets = audio.detect_onsets(&OnsetConfig::new()).unwrap();
        let starts = [0.5, 1.5, 2.5];

        assert!(!onsets.is_empty());
        for start in starts {
            assert!(
                onsets.iter().any(|&t| (t - start).abs() < 0.1),
                "no onset near {start}: {onsets:?}"
            );
        }
        for t in &onsets {
            assert!(starts.iter().any(|s| (t - s).abs() < 0.1), "stray onset at {t}");
        }
        assert!(onsets.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_silence_has_no_onsets() {
        let audio = silence(Duration::from_secs(2), 48000);
        assert!(audio.detect_onsets(&OnsetConfig::new()).unwrap().is_empty());
    }

    #[test]
    fn test_empty_signal() {
        let audio = AudioSignal::from_slice(&[], 48000);
        assert!(audio.onset_strength(&OnsetConfig::new()).unwrap().is_empty());
        assert!(audio.detect_onsets(&OnsetConfig::new()).unwrap().is_empty());
    }
}
