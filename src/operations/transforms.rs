//! Spectral front-end: STFT analysis and overlap-add resynthesis.
//!
//! This module implements [`AudioTransforms`] for [`AudioSignal`] and defines
//! [`SpectralMatrix`], the magnitude/phase pair every later stage consumes.
//! Analysis uses centred frames and a periodic Hann window; resynthesis is a
//! windowed overlap-add normalised by the summed squared window, so an
//! unmodified matrix reconstructs its source signal.

use super::traits::AudioTransforms;
use super::types::StftConfig;
use crate::utils::audio_math::fft_frequencies;
use crate::{AudioSignal, CrosswalkResult, ParameterError};
use ndarray::{Array1, Array2, ArrayView1};
use num_complex::Complex;
use rustfft::FftPlanner;

/// Magnitude spectrogram paired with the phase needed to invert it.
///
/// Indexed `[bin, frame]`. The magnitude and phase matrices always share the
/// same shape; phase cells are unit phasors.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralMatrix {
    magnitude: Array2<f64>,
    phase: Array2<Complex<f64>>,
    sample_rate: u32,
    config: StftConfig,
}

impl SpectralMatrix {
    /// Assembles a matrix from its parts.
    ///
    /// Fails if the shapes differ or the bin count does not match the window size.
    pub fn from_parts(
        magnitude: Array2<f64>,
        phase: Array2<Complex<f64>>,
        sample_rate: u32,
        config: StftConfig,
    ) -> CrosswalkResult<Self> {
        if magnitude.dim() != phase.dim() {
            return Err(ParameterError::invalid_value(
                "phase",
                format!(
                    "shape {:?} does not match magnitude shape {:?}",
                    phase.dim(),
                    magnitude.dim()
                ),
            )
            .into());
        }
        if magnitude.nrows() != config.num_bins() {
            return Err(ParameterError::invalid_value(
                "magnitude",
                format!(
                    "{} bins given, window size {} needs {}",
                    magnitude.nrows(),
                    config.window_size,
                    config.num_bins()
                ),
            )
            .into());
        }
        Ok(Self {
            magnitude,
            phase,
            sample_rate,
            config,
        })
    }

    /// Replaces the magnitude while keeping phase and metadata.
    pub fn with_magnitude(self, magnitude: Array2<f64>) -> CrosswalkResult<Self> {
        Self::from_parts(magnitude, self.phase, self.sample_rate, self.config)
    }

    /// The magnitude matrix.
    pub const fn magnitude(&self) -> &Array2<f64> {
        &self.magnitude
    }

    /// The phase matrix.
    pub const fn phase(&self) -> &Array2<Complex<f64>> {
        &self.phase
    }

    /// Sample rate of the analysed signal.
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// STFT parameters the matrix was computed with.
    pub const fn config(&self) -> &StftConfig {
        &self.config
    }

    /// Number of frequency bins.
    pub fn num_bins(&self) -> usize {
        self.magnitude.nrows()
    }

    /// Number of time frames.
    pub fn num_frames(&self) -> usize {
        self.magnitude.ncols()
    }

    /// Centre frequency in Hz of every bin.
    pub fn bin_frequencies(&self) -> Vec<f64> {
        fft_frequencies(self.config.window_size, f64::from(self.sample_rate))
    }

    /// Time in seconds of the centre of frame `frame`.
    pub fn frame_time(&self, frame: usize) -> f64 {
        crate::audio_math::frames_to_time(frame, f64::from(self.sample_rate), self.config.hop_size)
    }

    /// Reconstructs a time-domain signal from magnitude and phase.
    ///
    /// `length` pads or truncates the output; by default the output spans
    /// `(frames - 1) * hop_size` samples, the length of the centred analysis.
    pub fn istft(&self, length: Option<usize>) -> AudioSignal {
        let n_fft = self.config.window_size;
        let hop = self.config.hop_size;
        let num_frames = self.num_frames();
        let pad = n_fft / 2;
        let target = length.unwrap_or_else(|| num_frames.saturating_sub(1) * hop);

        if num_frames == 0 {
            return AudioSignal::new_mono(Array1::zeros(target), self.sample_rate);
        }

        let window = self.config.window.coefficients(n_fft);
        let output_length = (num_frames - 1) * hop + n_fft;
        let mut output = vec![0.0f64; output_length];
        let mut window_sum = vec![0.0f64; output_length];

        let mut planner = FftPlanner::new();
        let ifft = planner.plan_fft_inverse(n_fft);
        let mut buffer = vec![Complex::new(0.0, 0.0); n_fft];
        let scale = 1.0 / n_fft as f64;

        for frame_idx in 0..num_frames {
            fill_hermitian(
                &mut buffer,
                self.magnitude.column(frame_idx),
                self.phase.column(frame_idx),
            );
            ifft.process(&mut buffer);

            let start = frame_idx * hop;
            for (i, value) in buffer.iter().enumerate() {
                output[start + i] += value.re * scale * window[i];
                window_sum[start + i] += window[i] * window[i];
            }
        }

        for (sample, &norm) in output.iter_mut().zip(window_sum.iter()) {
            if norm > f64::MIN_POSITIVE {
                *sample /= norm;
            }
        }

        let mut samples: Vec<f64> = output.into_iter().skip(pad).take(target).collect();
        samples.resize(target, 0.0);
        AudioSignal::new_mono(Array1::from(samples), self.sample_rate)
    }
}

/// Rebuilds the full conjugate-symmetric spectrum of one frame.
fn fill_hermitian(
    buffer: &mut [Complex<f64>],
    magnitude: ArrayView1<'_, f64>,
    phase: ArrayView1<'_, Complex<f64>>,
) {
    let n_fft = buffer.len();
    let half = n_fft / 2;
    for k in 0..=half {
        let mut value = phase[k] * magnitude[k];
        // DC and Nyquist of a real signal carry no imaginary part
        if k == 0 || (k == half && n_fft % 2 == 0) {
            value = Complex::new(value.re, 0.0);
        }
        buffer[k] = value;
        if k > 0 && k < n_fft - k {
            buffer[n_fft - k] = value.conj();
        }
    }
}

impl AudioTransforms for AudioSignal {
    fn stft(&self, config: &StftConfig) -> CrosswalkResult<SpectralMatrix> {
        config.validate()?;

        let n_fft = config.window_size;
        let hop = config.hop_size;
        let num_bins = config.num_bins();
        let samples = self.samples();

        if samples.is_empty() {
            return SpectralMatrix::from_parts(
                Array2::zeros((num_bins, 0)),
                Array2::from_elem((num_bins, 0), Complex::new(1.0, 0.0)),
                self.sample_rate(),
                *config,
            );
        }

        // an odd window pads one sample more on the right than on the left
        let pad = n_fft / 2;
        let mut padded = vec![0.0f64; samples.len() + n_fft];
        for (dst, &src) in padded[pad..].iter_mut().zip(samples.iter()) {
            *dst = src;
        }

        let num_frames = 1 + samples.len() / hop;
        let window = config.window.coefficients(n_fft);

        let mut magnitude = Array2::zeros((num_bins, num_frames));
        let mut phase = Array2::from_elem((num_bins, num_frames), Complex::new(1.0, 0.0));

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n_fft);
        let mut buffer = vec![Complex::new(0.0, 0.0); n_fft];

        for frame_idx in 0..num_frames {
            let start = frame_idx * hop;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex::new(padded[start + i] * window[i], 0.0);
            }

            fft.process(&mut buffer);

            for (bin, value) in buffer.iter().take(num_bins).enumerate() {
                let norm = value.norm();
                magnitude[[bin, frame_idx]] = norm;
                if norm > 0.0 {
                    phase[[bin, frame_idx]] = *value / norm;
                }
            }
        }

        SpectralMatrix::from_parts(magnitude, phase, self.sample_rate(), *config)
    }
}
