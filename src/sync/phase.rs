use crate::audio::AudioSignal;
use crate::error::{MixError, Result};

/// Lines up the first beat of a candidate with the first beat of the reference
///
/// Only the first beat is aligned; there is no downbeat or meter detection,
/// so later beats stay in phase only as well as the tempos agree.
#[derive(Debug, Clone, Copy, Default)]
pub struct BeatPhaseAligner;

impl BeatPhaseAligner {
    pub fn new() -> Self {
        Self
    }

    /// Shift `signal` by `candidate_beats[0] - reference_beats[0]` seconds
    ///
    /// A positive offset delays the signal with leading silence; a negative
    /// or zero offset trims the start, possibly down to nothing. Without a
    /// beat on either side the signal comes back unchanged. Both tracks must
    /// share `signal`'s sample rate, given here as `reference_rate`.
    pub fn align(
        &self,
        signal: &AudioSignal,
        candidate_beats: &[f64],
        reference_beats: &[f64],
        reference_rate: u32,
    ) -> Result<AudioSignal> {
        if signal.sample_rate() != reference_rate {
            return Err(MixError::SampleRateMismatch {
                left: reference_rate,
                right: signal.sample_rate(),
            }.into());
        }

        let (Some(&candidate_first), Some(&reference_first)) =
            (candidate_beats.first(), reference_beats.first())
        else {
            tracing::debug!("No beats to align, leaving signal unshifted");
            return Ok(signal.clone());
        };

        let offset = signal.samples_for_seconds(candidate_first - reference_first);
        tracing::debug!(
            "Beat offset {:+.3}s ({:+} samples)",
            candidate_first - reference_first, offset
        );

        let samples = if offset > 0 {
            let pad = offset as usize;
            let mut shifted = Vec::with_capacity(pad + signal.len());
            shifted.resize(pad, 0.0);
            shifted.extend_from_slice(signal.samples());
            shifted
        } else {
            let trim = (offset.unsigned_abs() as usize).min(signal.len());
            signal.samples()[trim..].to_vec()
        };

        Ok(AudioSignal::new(samples, signal.sample_rate()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MatcherError;

    fn ramp(len: usize, sample_rate: u32) -> AudioSignal {
        AudioSignal::new((0..len).map(|i| i as f32).collect(), sample_rate)
    }

    #[test]
    fn test_late_beat_pads_with_silence() {
        let signal = ramp(10, 1000);
        let shifted = BeatPhaseAligner::new().align(&signal, &[0.5], &[0.497], 1000).unwrap();

        // 0.003s at 1 kHz is three samples
        assert_eq!(shifted.len(), 13);
        assert_eq!(&shifted.samples()[..3], &[0.0, 0.0, 0.0]);
        assert_eq!(&shifted.samples()[3..], signal.samples());
    }

    #[test]
    fn test_early_beat_trims_start() {
        let signal = ramp(10, 1000);
        let shifted = BeatPhaseAligner::new().align(&signal, &[0.25, 0.75], &[0.254, 0.754], 1000).unwrap();

        assert_eq!(shifted.samples(), &[4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_offset_truncates_toward_zero() {
        let signal = ramp(10, 1000);
        // 2.9 samples early trims two, 2.9 samples late pads two
        let early = BeatPhaseAligner::new().align(&signal, &[0.0], &[0.0029], 1000).unwrap();
        let late = BeatPhaseAligner::new().align(&signal, &[0.0029], &[0.0], 1000).unwrap();
        assert_eq!(early.len(), 8);
        assert_eq!(late.len(), 12);
    }

    #[test]
    fn test_trimming_past_the_end_is_empty() {
        let signal = ramp(10, 1000);
        let shifted = BeatPhaseAligner::new().align(&signal, &[0.0], &[5.0], 1000).unwrap();
        assert!(shifted.is_empty());
    }

    #[test]
    fn test_missing_beats_leave_signal_unchanged() {
        let signal = ramp(10, 1000);
        let aligner = BeatPhaseAligner::new();

        assert_eq!(aligner.align(&signal, &[], &[0.2], 1000).unwrap(), signal);
        assert_eq!(aligner.align(&signal, &[0.2], &[], 1000).unwrap(), signal);
    }

    #[test]
    fn test_rate_mismatch_is_rejected() {
        let signal = ramp(10, 1000);
        assert!(matches!(
            BeatPhaseAligner::new().align(&signal, &[0.1], &[0.1], 2000),
            Err(MatcherError::Mix(MixError::SampleRateMismatch { .. }))
        ));
    }
}
