//! Short-time power spectra shared by the timbre, harmony and onset features.

use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};

use crate::error::{FeatureError, Result};

/// Periodic Hann window of `size` samples
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Centered STFT producing one power spectrum per hop
///
/// Frame `t` is centered on sample `t * hop_size`; the signal is zero-padded
/// by half a window on both sides, so there are `1 + len / hop_size` frames.
pub struct PowerSpectrogram {
    window_size: usize,
    hop_size: usize,
    window: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
}

impl PowerSpectrogram {
    pub fn new(window_size: usize, hop_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(window_size);

        Self {
            window_size,
            hop_size,
            window: hann_window(window_size),
            fft,
        }
    }

    /// Number of bins per spectrum
    pub fn num_bins(&self) -> usize {
        self.window_size / 2 + 1
    }

    /// Number of frames produced for `len` samples
    pub fn num_frames(&self, len: usize) -> usize {
        1 + len / self.hop_size
    }

    /// Frequency in Hz of an FFT bin
    pub fn bin_frequency(&self, bin: usize, sample_rate: u32) -> f32 {
        bin as f32 * sample_rate as f32 / self.window_size as f32
    }

    /// Run the STFT, handing each frame's power spectrum to `visit`
    ///
    /// Spectra are streamed rather than collected, so long windows over long
    /// tracks stay cheap on memory.
    pub fn for_each_frame<F>(&self, samples: &[f32], mut visit: F) -> Result<()>
    where
        F: FnMut(usize, &[f32]),
    {
        let half = self.window_size / 2;
        let mut input = self.fft.make_input_vec();
        let mut spectrum = self.fft.make_output_vec();
        let mut power = vec![0.0f32; self.num_bins()];

        for frame_idx in 0..self.num_frames(samples.len()) {
            let center = frame_idx * self.hop_size;

            for (i, slot) in input.iter_mut().enumerate() {
                // Padded position i maps to sample center + i - half
                let sample = (center + i)
                    .checked_sub(half)
                    .and_then(|pos| samples.get(pos))
                    .copied()
                    .unwrap_or(0.0);
                *slot = sample * self.window[i];
            }

            self.fft.process(&mut input, &mut spectrum)
                .map_err(|e| FeatureError::AnalysisFailed {
                    reason: format!("FFT processing failed: {}", e)
                })?;

            for (p, c) in power.iter_mut().zip(spectrum.iter()) {
                *p = c.norm_sqr();
            }

            visit(frame_idx, &power);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count_is_centered() {
        let stft = PowerSpectrogram::new(1024, 256);
        assert_eq!(stft.num_frames(0), 1);
        assert_eq!(stft.num_frames(1000), 4);
        assert_eq!(stft.num_bins(), 513);
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let sample_rate = 8000;
        let stft = PowerSpectrogram::new(1024, 512);
        // 1000 Hz sits exactly on bin 128
        let samples: Vec<f32> = (0..8000)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sample_rate as f32).sin())
            .collect();

        let mut peaks = Vec::new();
        stft.for_each_frame(&samples, |_, power| {
            let (bin, _) = power
                .iter()
                .enumerate()
                .fold((0, 0.0f32), |best, (i, &p)| if p > best.1 { (i, p) } else { best });
            peaks.push(bin);
        }).unwrap();

        assert_eq!(peaks.len(), stft.num_frames(samples.len()));
        assert!(peaks[2..peaks.len() - 2].iter().all(|&bin| bin == 128));
        assert_eq!(stft.bin_frequency(128, sample_rate), 1000.0);
    }
}
