//! Offline phase vocoder.
//!
//! The signal is analysed with a centered Hann STFT, then resynthesized from
//! spectra sampled at fractional frame positions `0, r, 2r, ...`. Magnitudes
//! are interpolated linearly between neighbouring analysis frames; phases are
//! accumulated from the measured per-bin advance, so partials keep their
//! frequency while the frame rate changes.

use std::f32::consts::PI;

use realfft::RealFftPlanner;
use rustfft::num_complex::Complex;

use crate::audio::AudioSignal;
use crate::config::StretchConfig;
use crate::error::{AudioError, Result};
use crate::features::spectrum::hann_window;

const TWO_PI: f32 = 2.0 * PI;

/// Window-sum values below this are treated as uncovered
const MIN_WINDOW_SUM: f32 = 1e-6;

type Spectrum = Vec<Complex<f32>>;

/// Changes tempo without changing pitch
#[derive(Debug, Clone)]
pub struct TempoAligner {
    window_size: usize,
    hop_size: usize,
    window: Vec<f32>,
}

impl TempoAligner {
    pub fn new(config: &StretchConfig) -> Self {
        Self {
            window_size: config.window_size,
            hop_size: config.hop_size,
            window: hann_window(config.window_size),
        }
    }

    /// Time-stretch by `ratio = tempo_candidate / tempo_reference`
    ///
    /// The result has `round(len / ratio)` samples at the same rate, so a
    /// ratio above one shortens the track and speeds it up.
    pub fn stretch(&self, signal: &AudioSignal, ratio: f64) -> Result<AudioSignal> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(AudioError::InvalidParameters {
                details: format!("stretch ratio must be positive, got {}", ratio),
            }.into());
        }

        let target_len = (signal.len() as f64 / ratio).round() as usize;
        if signal.is_empty() {
            return Ok(AudioSignal::new(Vec::new(), signal.sample_rate()));
        }

        let analysis = self.analyze(signal.samples())?;
        let synthesis = self.advance_phases(&analysis, ratio);
        let samples = self.overlap_add(synthesis, target_len)?;

        tracing::debug!(
            "Stretched {} -> {} samples (ratio {:.4})",
            signal.len(), samples.len(), ratio
        );

        Ok(AudioSignal::new(samples, signal.sample_rate()))
    }

    /// Centered STFT, one complex spectrum per hop
    fn analyze(&self, samples: &[f32]) -> Result<Vec<Spectrum>> {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(self.window_size);
        let half = self.window_size / 2;
        let num_frames = 1 + samples.len() / self.hop_size;

        let mut input = fft.make_input_vec();
        let mut frames = Vec::with_capacity(num_frames);

        for frame_idx in 0..num_frames {
            let center = frame_idx * self.hop_size;
            for (i, slot) in input.iter_mut().enumerate() {
                let sample = (center + i)
                    .checked_sub(half)
                    .and_then(|pos| samples.get(pos))
                    .copied()
                    .unwrap_or(0.0);
                *slot = sample * self.window[i];
            }

            let mut spectrum = fft.make_output_vec();
            fft.process(&mut input, &mut spectrum)
                .map_err(|e| AudioError::InvalidParameters {
                    details: format!("forward FFT failed: {}", e),
                })?;
            frames.push(spectrum);
        }

        Ok(frames)
    }

    /// Resample the frame sequence at steps of `ratio`
    fn advance_phases(&self, frames: &[Spectrum], ratio: f64) -> Vec<Spectrum> {
        let num_bins = self.window_size / 2 + 1;
        let zero = vec![Complex::new(0.0f32, 0.0); num_bins];

        // Phase a bin would advance over one hop if it sat exactly on its center frequency
        let expected: Vec<f32> = (0..num_bins)
            .map(|k| TWO_PI * k as f32 * self.hop_size as f32 / self.window_size as f32)
            .collect();

        let mut phase: Vec<f32> = frames[0].iter().map(|c| c.arg()).collect();
        let mut output = Vec::with_capacity((frames.len() as f64 / ratio).ceil() as usize);

        let mut step = 0.0f64;
        while step < frames.len() as f64 {
            let idx = step as usize;
            let alpha = (step - idx as f64) as f32;
            let current = &frames[idx];
            let next = frames.get(idx + 1).unwrap_or(&zero);

            let spectrum: Spectrum = (0..num_bins)
                .map(|k| {
                    let magnitude = (1.0 - alpha) * current[k].norm() + alpha * next[k].norm();
                    Complex::from_polar(magnitude, phase[k])
                })
                .collect();
            output.push(spectrum);

            for k in 0..num_bins {
                let deviation = wrap_phase(next[k].arg() - current[k].arg() - expected[k]);
                phase[k] += expected[k] + deviation;
            }

            step += ratio;
        }

        output
    }

    /// Inverse STFT with squared-window normalization, trimmed to `target_len`
    fn overlap_add(&self, frames: Vec<Spectrum>, target_len: usize) -> Result<Vec<f32>> {
        let mut planner = RealFftPlanner::<f32>::new();
        let ifft = planner.plan_fft_inverse(self.window_size);
        let half = self.window_size / 2;
        let scale = 1.0 / self.window_size as f32;

        let full_len = self.window_size + self.hop_size * frames.len().saturating_sub(1);
        let mut output = vec![0.0f32; full_len];
        let mut window_sum = vec![0.0f32; full_len];
        let mut frame_out = ifft.make_output_vec();

        for (frame_idx, mut spectrum) in frames.into_iter().enumerate() {
            // A real signal has purely real DC and Nyquist bins
            if let Some(dc) = spectrum.first_mut() {
                dc.im = 0.0;
            }
            if let Some(nyquist) = spectrum.last_mut() {
                nyquist.im = 0.0;
            }

            ifft.process(&mut spectrum, &mut frame_out)
                .map_err(|e| AudioError::InvalidParameters {
                    details: format!("inverse FFT failed: {}", e),
                })?;

            let start = frame_idx * self.hop_size;
            for (i, (&sample, &w)) in frame_out.iter().zip(self.window.iter()).enumerate() {
                output[start + i] += sample * scale * w;
                window_sum[start + i] += w * w;
            }
        }

        for (sample, &sum) in output.iter_mut().zip(window_sum.iter()) {
            if sum > MIN_WINDOW_SUM {
                *sample /= sum;
            }
        }

        let mut samples: Vec<f32> = output.into_iter().skip(half).take(target_len).collect();
        samples.resize(target_len, 0.0);
        Ok(samples)
    }
}

/// Wrap a phase into `[-PI, PI)`
fn wrap_phase(phase: f32) -> f32 {
    (phase + PI).rem_euclid(TWO_PI) - PI
}
