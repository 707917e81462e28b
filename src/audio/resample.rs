use rubato::{FftFixedInOut, Resampler as _};

use crate::audio::types::AudioSignal;
use crate::error::{AudioError, Result};

const CHUNK_SIZE: usize = 1024;

/// Sample-rate conversion for signals that must share a rate
pub struct Resampler;

impl Resampler {
    /// Convert `signal` to `target_rate` Hz
    ///
    /// The output length is `len * target / source`, rounded; the filter
    /// delay is trimmed from the front.
    pub fn resample(signal: &AudioSignal, target_rate: u32) -> Result<AudioSignal> {
        let source_rate = signal.sample_rate();
        if source_rate == target_rate || signal.is_empty() {
            return Ok(AudioSignal::new(signal.samples().to_vec(), target_rate));
        }

        let mut resampler = FftFixedInOut::<f32>::new(
            source_rate as usize,
            target_rate as usize,
            CHUNK_SIZE,
            1,
        )
        .map_err(|e| failed(e))?;

        let expected_len = (signal.len() as f64 * target_rate as f64 / source_rate as f64).round() as usize;
        let delay = resampler.output_delay();
        let chunk_size = resampler.input_frames_next();

        let mut output = Vec::with_capacity(expected_len + delay + chunk_size);
        let mut input = signal.samples().to_vec();

        // Flush the filter delay with trailing silence
        let flush = (delay as f64 * source_rate as f64 / target_rate as f64).ceil() as usize;
        input.resize(input.len() + flush, 0.0);

        for chunk in input.chunks(chunk_size) {
            let block = if chunk.len() == chunk_size {
                chunk.to_vec()
            } else {
                let mut padded = chunk.to_vec();
                padded.resize(chunk_size, 0.0);
                padded
            };

            let resampled = resampler
                .process(&[block], None)
                .map_err(|e| failed(e))?;
            if let Some(channel) = resampled.into_iter().next() {
                output.extend(channel);
            }
        }

        let start = delay.min(output.len());
        let mut samples: Vec<f32> = output.split_off(start);
        samples.resize(expected_len, 0.0);

        tracing::debug!(
            "Resampled {} samples at {} Hz to {} samples at {} Hz",
            signal.len(), source_rate, samples.len(), target_rate
        );

        Ok(AudioSignal::new(samples, target_rate))
    }
}

fn failed(e: impl std::fmt::Display) -> AudioError {
    AudioError::ResampleFailed {
        reason: e.to_string()
    }
}
