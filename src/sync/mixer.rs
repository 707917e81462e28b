use crate::audio::AudioSignal;
use crate::error::{MixError, Result};

/// Equal-weight two-track mixer with peak normalization
#[derive(Debug, Clone, Copy)]
pub struct Mixer {
    gain: f32,
}

impl Default for Mixer {
    fn default() -> Self {
        Self { gain: 0.5 }
    }
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `0.5 * a + 0.5 * b`, scaled so the loudest sample is exactly 1.0
    ///
    /// The shorter input is padded with silence at the end.
    pub fn mix(&self, a: &AudioSignal, b: &AudioSignal) -> Result<AudioSignal> {
        if a.sample_rate() != b.sample_rate() {
            return Err(MixError::SampleRateMismatch {
                left: a.sample_rate(),
                right: b.sample_rate(),
            }.into());
        }

        let len = a.len().max(b.len());
        let (a, b) = (a.padded_to(len), b.padded_to(len));

        let mut mixed: Vec<f32> = a
            .samples()
            .iter()
            .zip(b.samples().iter())
            .map(|(&x, &y)| self.gain * x + self.gain * y)
            .collect();

        let peak = mixed
            .iter()
            .filter(|s| s.is_finite())
            .fold(0.0f32, |acc, s| acc.max(s.abs()));
        if !(peak > 0.0) {
            return Err(MixError::Silent.into());
        }

        for sample in mixed.iter_mut() {
            *sample = if sample.is_finite() { *sample / peak } else { 0.0 };
        }

        tracing::debug!("Mixed {} samples, pre-normalization peak {:.4}", len, peak);
        Ok(AudioSignal::new(mixed, a.sample_rate()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MatcherError;

    #[test]
    fn test_mix_is_peak_normalized() {
        let a = AudioSignal::new(vec![0.2, -0.4, 0.1], 8000);
        let b = AudioSignal::new(vec![0.2, 0.0, 0.1, 0.05, -0.1], 8000);

        let mixed = Mixer::new().mix(&a, &b).unwrap();
        assert_eq!(mixed.len(), 5);

        let peak = mixed.peak();
        assert!((peak - 1.0).abs() < 1e-6);
        assert!(mixed.samples().iter().all(|s| s.is_finite()));

        // Relative levels survive: 0.2, -0.2, 0.1, 0.025, -0.05 scaled by 1/0.2
        let expected = [1.0, -1.0, 0.5, 0.125, -0.25];
        for (got, want) in mixed.samples().iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-6, "{} vs {}", got, want);
        }
    }

    #[test]
    fn test_quiet_inputs_are_boosted() {
        let a = AudioSignal::new(vec![1e-4; 100], 44100);
        let b = AudioSignal::silence(50, 44100);

        let mixed = Mixer::new().mix(&a, &b).unwrap();
        assert!((mixed.peak() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_silent_mix_is_an_error() {
        let a = AudioSignal::silence(100, 44100);
        let b = AudioSignal::new(Vec::new(), 44100);
        assert!(matches!(
            Mixer::new().mix(&a, &b),
            Err(MatcherError::Mix(MixError::Silent))
        ));
    }

    #[test]
    fn test_cancelling_inputs_are_silent() {
        let a = AudioSignal::new(vec![0.5, -0.5], 8000);
        let b = AudioSignal::new(vec![-0.5, 0.5], 8000);
        assert!(Mixer::new().mix(&a, &b).is_err());
    }

    #[test]
    fn test_sample_rate_mismatch() {
        let a = AudioSignal::new(vec![0.5], 8000);
        let b = AudioSignal::new(vec![0.5], 16000);
        assert!(matches!(
            Mixer::new().mix(&a, &b),
            Err(MatcherError::Mix(MixError::SampleRateMismatch { left: 8000, right: 16000 }))
        ));
    }
}
