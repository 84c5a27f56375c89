//! Synthetic signal generation.
//!
//! Used to build calibration clips: silence, steady tones, beacon-like pulse
//! trains and (with the `random-generation` feature) white noise.

use std::f64::consts::PI;
use std::time::Duration;

use ndarray::Array1;

use crate::AudioSignal;

fn num_samples(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize
}

/// Generates a silent clip.
pub fn silence(duration: Duration, sample_rate: u32) -> AudioSignal {
    AudioSignal::new_mono(Array1::zeros(num_samples(duration, sample_rate)), sample_rate)
}

/// Generates a sine wave.
pub fn sine_wave(frequency: f64, duration: Duration, sample_rate: u32, amplitude: f64) -> AudioSignal {
    let sr = f64::from(sample_rate);
    let samples = Array1::from_iter(
        (0..num_samples(duration, sample_rate))
            .map(|i| amplitude * (2.0 * PI * frequency * i as f64 / sr).sin()),
    );
    AudioSignal::new_mono(samples, sample_rate)
}

/// Description of a periodic train of tone pulses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseTrain {
    /// Tone frequency in Hz.
    pub frequency: f64,
    /// Length of each pulse in seconds.
    pub pulse_seconds: f64,
    /// Onset-to-onset spacing in seconds.
    pub period_seconds: f64,
    /// Number of pulses.
    pub count: usize,
    /// Onset of the first pulse in seconds.
    pub offset_seconds: f64,
    /// Peak amplitude.
    pub amplitude: f64,
}

impl PulseTrain {
    /// Onset sample index of pulse `index`.
    pub fn onset_sample(&self, index: usize, sample_rate: u32) -> usize {
        let t = self.offset_seconds + index as f64 * self.period_seconds;
        (t * f64::from(sample_rate)).round() as usize
    }

    /// Renders the train into a clip of `total` length embedded in silence.
    ///
    /// Pulses that would run past the end of the clip are truncated.
    pub fn render(&self, total: Duration, sample_rate: u32) -> AudioSignal {
        let sr = f64::from(sample_rate);
        let len = num_samples(total, sample_rate);
        let pulse_len = (self.pulse_seconds * sr).round() as usize;
        let mut samples = Array1::zeros(len);

        for pulse in 0..self.count {
            let start = self.onset_sample(pulse, sample_rate);
            let end = (start + pulse_len).min(len);
            for i in start..end {
                let n = (i - start) as f64;
                samples[i] = self.amplitude * (2.0 * PI * self.frequency * n / sr).sin();
            }
        }

        AudioSignal::new_mono(samples, sample_rate)
    }
}

/// Generates uniformly distributed white noise in `[-amplitude, amplitude)`.
///
/// A fixed `seed` makes the output reproducible.
#[cfg(feature = "random-generation")]
pub fn white_noise(
    duration: Duration,
    sample_rate: u32,
    amplitude: f64,
    seed: Option<u64>,
) -> AudioSignal {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let samples = Array1::from_iter(
        (0..num_samples(duration, sample_rate)).map(|_| amplitude * rng.random_range(-1.0..1.0)),
    );
    AudioSignal::new_mono(samples, sample_rate)
}

/// Mixes two clips sample by sample; the result has the length of the longer one.
pub fn mix(a: &AudioSignal, b: &AudioSignal) -> AudioSignal {
    let len = a.len().max(b.len());
    let (sa, sb) = (a.samples(), b.samples());
    let samples = Array1::from_iter((0..len).map(|i| {
        sa.get(i).copied().unwrap_or(0.0) + sb.get(i).copied().unwrap_or(0.0)
    }));
    AudioSignal::new_mono(samples, a.sample_rate())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_length() {
        let audio = silence(Duration::from_millis(500), 16000);
        assert_eq!(audio.len(), 8000);
        assert!(audio.samples().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_sine_wave_peak() {
        let audio = sine_wave(1000.0, Duration::from_secs(1), 48000, 0.5);
        let peak = audio.samples().iter().fold(0.0_f64, |m, s| m.max(s.abs()));
        assert!((peak - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_pulse_train_layout() {
        let train = PulseTrain {
            frequency: 2650.0,
            pulse_seconds: 0.01,
            period_seconds: 0.5,
            count: 3,
            offset_seconds: 0.25,
            amplitude: 0.5,
        };
        let audio = train.render(Duration::from_secs(2), 8000);
        let samples = audio.samples();

        assert_eq!(train.onset_sample(1, 8000), 6000);
        // silent before the first pulse and between pulses
        assert!(samples.iter().take(2000).all(|&s| s == 0.0));
        assert!(samples.iter().skip(2080).take(3920).all(|&s| s == 0.0));
        assert!(samples.iter().skip(2000).take(80).any(|&s| s != 0.0));
    }

    #[cfg(feature = "random-generation")]
    #[test]
    fn test_white_noise_is_reproducible() {
        let a = white_noise(Duration::from_millis(10), 8000, 0.1, Some(7));
        let b = white_noise(Duration::from_millis(10), 8000, 0.1, Some(7));
        assert_eq!(a, b);
        assert!(a.samples().iter().all(|s| s.abs() <= 0.1));
    }

    #[test]
    fn test_mix_pads_shorter() {
        let a = AudioSignal::from_slice(&[1.0, 1.0, 1.0], 8000);
        let b = AudioSignal::from_slice(&[0.5], 8000);
        let mixed = mix(&a, &b);
        assert_eq!(mixed.as_slice(), Some(&[1.5, 1.0, 1.0][..]));
    }
}
