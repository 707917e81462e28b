use std::path::PathBuf;

/// Mono audio samples at a fixed sample rate
///
/// Transformations (stretch, pad, trim, mix) build new signals; a signal is
/// never edited in place once created.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSignal {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioSignal {
    /// Wrap mono samples recorded at `sample_rate` Hz
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        debug_assert!(sample_rate > 0, "sample rate must be positive");
        Self { samples, sample_rate }
    }

    /// Silent signal of the given length
    pub fn silence(len: usize, sample_rate: u32) -> Self {
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
    }

    /// True when no sample rises above `threshold`
    pub fn is_silent(&self, threshold: f32) -> bool {
        self.peak() <= threshold
    }

    /// Whole samples in `seconds`, truncated toward zero
    pub fn samples_for_seconds(&self, seconds: f64) -> i64 {
        (seconds * self.sample_rate as f64) as i64
    }

    /// Time in seconds for a sample index
    pub fn time_for_sample(&self, sample_index: usize) -> f64 {
        sample_index as f64 / self.sample_rate as f64
    }

    /// Copy of the signal zero-padded at the end to `len` samples
    pub fn padded_to(&self, len: usize) -> Self {
        let mut samples = self.samples.clone();
        if samples.len() < len {
            samples.resize(len, 0.0);
        }
        Self::new(samples, self.sample_rate)
    }
}

/// Decoded audio file before mono conversion
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Audio samples (interleaved for stereo, mono for single channel)
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Original file path
    pub file_path: PathBuf,
}

impl AudioData {
    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        let frames = self.samples.len() / self.channels.max(1) as usize;
        frames as f64 / self.sample_rate as f64
    }

    /// Get mono mix of all channels
    pub fn mono_samples(&self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples.clone();
        }

        let mut mono = Vec::with_capacity(self.samples.len() / self.channels as usize);

        for chunk in self.samples.chunks(self.channels as usize) {
            let sum: f32 = chunk.iter().sum();
            mono.push(sum / self.channels as f32);
        }

        mono
    }

    /// Collapse to a mono signal
    pub fn into_signal(self) -> AudioSignal {
        AudioSignal::new(self.mono_samples(), self.sample_rate)
    }
}
