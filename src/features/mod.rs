//! # Feature Extraction
//!
//! Turns a mono signal into the three descriptors the matcher compares:
//!
//! - **Timbre**: time-averaged MFCCs (default 13 coefficients)
//! - **Harmony**: time-averaged constant-Q chroma (default 12 pitch classes)
//! - **Tempo**: global BPM plus beat onset times in seconds
//!
//! ## Usage
//!
//! ```rust,no_run
//! use track_matcher::{audio::AudioLoader, config::FeatureConfig, features::FeatureExtractor};
//!
//! # fn main() -> anyhow::Result<()> {
//! let signal = AudioLoader::load("song.wav")?;
//! let features = FeatureExtractor::new(FeatureConfig::default()).extract(&signal)?;
//! println!("{:.1} BPM, {} beats", features.tempo.bpm, features.tempo.beats.len());
//! # Ok(())
//! # }
//! ```

pub mod beat;
pub mod chroma;
pub mod mfcc;
pub mod spectrum;

use crate::audio::AudioSignal;
use crate::config::FeatureConfig;
use crate::error::{AudioError, Result};

use self::chroma::ChromaFilter;
use self::mfcc::MelFilterBank;
use self::spectrum::PowerSpectrogram;

/// Fixed-length, time-averaged spectral descriptor
pub type FeatureVector = Vec<f32>;

/// Tempo and beat positions of one track
#[derive(Debug, Clone, PartialEq)]
pub struct TempoEstimate {
    /// Beats per minute, always positive
    pub bpm: f32,

    /// Beat onset times in seconds, strictly increasing
    pub beats: Vec<f64>,
}

impl TempoEstimate {
    /// First beat, if any were found
    pub fn first_beat(&self) -> Option<f64> {
        self.beats.first().copied()
    }
}

/// Everything the matcher needs to know about one track
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFeatures {
    pub timbre: FeatureVector,
    pub harmony: FeatureVector,
    pub tempo: TempoEstimate,
}

/// Extracts timbre, harmony and tempo features from mono signals
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Extract all features of a track
    pub fn extract(&self, signal: &AudioSignal) -> Result<TrackFeatures> {
        self.check_audible(signal)?;

        let mel_db = self.mel_spectrogram(signal)?;
        let timbre = mfcc::mean_mfcc(&mel_db, self.config.n_mfcc);
        let tempo = self.tempo_from_mel(&mel_db, signal.sample_rate());
        let harmony = self.harmony(signal)?;

        tracing::debug!(
            "Extracted features: {:.1}s, {:.1} BPM, {} beats",
            signal.duration(), tempo.bpm, tempo.beats.len()
        );

        Ok(TrackFeatures { timbre, harmony, tempo })
    }

    /// Tempo and beats only
    ///
    /// Used to re-detect beats after a track has been time-stretched.
    pub fn tempo(&self, signal: &AudioSignal) -> Result<TempoEstimate> {
        self.check_audible(signal)?;
        let mel_db = self.mel_spectrogram(signal)?;
        Ok(self.tempo_from_mel(&mel_db, signal.sample_rate()))
    }

    fn check_audible(&self, signal: &AudioSignal) -> Result<()> {
        if signal.is_empty() {
            return Err(AudioError::Empty.into());
        }

        let peak = signal.peak();
        if !(peak > self.config.silence_threshold) {
            return Err(AudioError::Silent { peak }.into());
        }

        Ok(())
    }

    /// Log-power mel spectrogram, one row per frame
    fn mel_spectrogram(&self, signal: &AudioSignal) -> Result<Vec<Vec<f32>>> {
        let stft = PowerSpectrogram::new(self.config.window_size, self.config.hop_size);
        let bank = MelFilterBank::new(self.config.n_mels, signal.sample_rate(), self.config.window_size);

        let mut frames = Vec::with_capacity(stft.num_frames(signal.len()));
        stft.for_each_frame(signal.samples(), |_, power| frames.push(bank.apply(power)))?;

        mfcc::power_to_db(&mut frames);
        Ok(frames)
    }

    fn tempo_from_mel(&self, mel_db: &[Vec<f32>], sample_rate: u32) -> TempoEstimate {
        let hop = self.config.hop_size;
        let envelope = beat::onset_envelope(mel_db, self.config.window_size, hop);

        match beat::estimate_tempo(&envelope, sample_rate, hop, self.config.min_bpm, self.config.max_bpm) {
            Some(bpm) => {
                let frames = beat::track_beats(&envelope, bpm, sample_rate, hop, self.config.tightness);
                TempoEstimate {
                    bpm,
                    beats: beat::frames_to_seconds(&frames, sample_rate, hop),
                }
            }
            None => {
                tracing::debug!(
                    "No onset energy, falling back to {:.1} BPM without beats",
                    self.config.fallback_bpm
                );
                TempoEstimate {
                    bpm: self.config.fallback_bpm,
                    beats: Vec::new(),
                }
            }
        }
    }

    /// Time-averaged constant-Q chroma
    fn harmony(&self, signal: &AudioSignal) -> Result<FeatureVector> {
        let window = self.config.chroma_window_size;
        let stft = PowerSpectrogram::new(window, self.config.hop_size);
        let filter = ChromaFilter::new(self.config.n_chroma, signal.sample_rate(), window);

        let mut mean = vec![0.0f32; self.config.n_chroma];
        let mut frames = 0usize;
        stft.for_each_frame(signal.samples(), |_, power| {
            for (acc, c) in mean.iter_mut().zip(filter.frame_chroma(power)) {
                *acc += c;
            }
            frames += 1;
        })?;

        mean.iter_mut().for_each(|c| *c /= frames.max(1) as f32);
        Ok(mean)
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(FeatureConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MatcherError;

    const SAMPLE_RATE: u32 = 22050;

    fn tone(freq: f32, seconds: f32) -> AudioSignal {
        let len = (SAMPLE_RATE as f32 * seconds) as usize;
        let samples = (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin() * 0.5)
            .collect();
        AudioSignal::new(samples, SAMPLE_RATE)
    }

    /// Decaying 1 kHz blips every `60 / bpm` seconds, starting at `start`
    fn click_track(bpm: f64, seconds: f64, start: f64, sample_rate: u32) -> AudioSignal {
        let len = (seconds * sample_rate as f64) as usize;
        let mut samples = vec![0.0f32; len];
        let period = 60.0 / bpm;
        let click_len = (0.03 * sample_rate as f64) as usize;

        let mut t = start;
        while t < seconds {
            let first = (t * sample_rate as f64) as usize;
            for i in 0..click_len {
                if let Some(slot) = samples.get_mut(first + i) {
                    let phase = 2.0 * std::f64::consts::PI * 1000.0 * i as f64 / sample_rate as f64;
                    *slot = (phase.sin() * (-(i as f64) / (0.005 * sample_rate as f64)).exp()) as f32 * 0.8;
                }
            }
            t += period;
        }

        AudioSignal::new(samples, sample_rate)
    }

    #[test]
    fn test_vector_lengths_follow_config() {
        let extractor = FeatureExtractor::default();
        let features = extractor.extract(&tone(440.0, 2.0)).unwrap();

        assert_eq!(features.timbre.len(), 13);
        assert_eq!(features.harmony.len(), 12);
        assert!(features.tempo.bpm > 0.0);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let extractor = FeatureExtractor::default();
        let signal = click_track(120.0, 4.0, 0.1, SAMPLE_RATE);

        let first = extractor.extract(&signal).unwrap();
        let second = extractor.extract(&signal).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_harmony_is_octave_invariant() {
        let extractor = FeatureExtractor::default();
        let low = extractor.extract(&tone(220.0, 2.0)).unwrap();
        let high = extractor.extract(&tone(880.0, 2.0)).unwrap();

        let dot: f32 = low.harmony.iter().zip(high.harmony.iter()).map(|(a, b)| a * b).sum();
        let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
        let similarity = dot / (norm(&low.harmony) * norm(&high.harmony));
        assert!(similarity > 0.95, "similarity {}", similarity);
    }

    #[test]
    fn test_click_track_tempo_and_beats() {
        let extractor = FeatureExtractor::default();
        let signal = click_track(120.0, 10.0, 0.25, SAMPLE_RATE);
        let tempo = extractor.tempo(&signal).unwrap();

        assert!((tempo.bpm - 120.0).abs() < 120.0 * 0.04, "bpm {}", tempo.bpm);
        assert!(tempo.beats.len() >= 15, "only {} beats", tempo.beats.len());
        assert!(tempo.beats.windows(2).all(|w| w[1] > w[0]));

        // Every detected beat sits on a click
        for beat in &tempo.beats {
            let nearest = ((beat - 0.25) / 0.5).round() * 0.5 + 0.25;
            assert!((beat - nearest).abs() < 0.07, "beat at {:.3}s", beat);
        }
    }

    #[test]
    fn test_silent_input_is_rejected() {
        let extractor = FeatureExtractor::default();

        let silent = AudioSignal::silence(SAMPLE_RATE as usize, SAMPLE_RATE);
        assert!(matches!(
            extractor.extract(&silent),
            Err(MatcherError::Audio(AudioError::Silent { .. }))
        ));

        let empty = AudioSignal::new(Vec::new(), SAMPLE_RATE);
        assert!(matches!(
            extractor.extract(&empty),
            Err(MatcherError::Audio(AudioError::Empty))
        ));
    }

    #[test]
    fn test_steady_tone_reports_positive_tempo() {
        let extractor = FeatureExtractor::default();
        let tempo = extractor.tempo(&tone(440.0, 3.0)).unwrap();
        assert!(tempo.bpm > 0.0);
    }

    #[test]
    fn test_low_sample_rate_tempo_within_configured_range() {
        let sample_rate: u32 = 4000;
        let samples = (0..sample_rate * 3)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect();
        let signal = AudioSignal::new(samples, sample_rate);

        let extractor = FeatureExtractor::default();
        let features = extractor.extract(&signal).unwrap();
        let config = extractor.config();
        assert!(
            features.tempo.bpm >= config.min_bpm && features.tempo.bpm <= config.max_bpm,
            "bpm {}",
            features.tempo.bpm
        );
    }
}
