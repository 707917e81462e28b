//! Constant-Q chroma.
//!
//! Semitone bands are spaced logarithmically from C1 with a fixed quality
//! factor, so every band spans the same musical interval. Band magnitudes
//! fold onto pitch classes (index 0 = C), which makes the profile
//! independent of the octave a note is played in.

/// C1, the lowest band center
const FMIN_HZ: f32 = 32.703_197;

/// Seven octaves of semitone bands
const NUM_BANDS: usize = 84;

const BINS_PER_OCTAVE: usize = 12;

/// One semitone band: FFT bins and their weights, summing to one
struct Band {
    pitch_class: usize,
    first_bin: usize,
    weights: Vec<f32>,
}

/// Maps STFT magnitude spectra onto pitch classes
pub struct ChromaFilter {
    bands: Vec<Band>,
    n_chroma: usize,
}

impl ChromaFilter {
    /// Build the band kernels for a given rate and STFT size
    ///
    /// Bands whose center sits above 95% of Nyquist are dropped.
    pub fn new(n_chroma: usize, sample_rate: u32, window_size: usize) -> Self {
        let num_bins = window_size / 2 + 1;
        let bin_hz = sample_rate as f32 / window_size as f32;
        let nyquist = sample_rate as f32 / 2.0;
        let q = 1.0 / (2f32.powf(1.0 / BINS_PER_OCTAVE as f32) - 1.0);

        let bands = (0..NUM_BANDS)
            .map(|k| (k, FMIN_HZ * 2f32.powf(k as f32 / BINS_PER_OCTAVE as f32)))
            .take_while(|&(_, center)| center < nyquist * 0.95)
            .map(|(k, center)| {
                // Bandwidth is center / Q but never narrower than one FFT bin
                let sigma = (center / q).max(bin_hz) / 2.0;
                let first = ((center - 3.0 * sigma) / bin_hz).floor().max(0.0) as usize;
                let last = (((center + 3.0 * sigma) / bin_hz).ceil() as usize).min(num_bins - 1);

                let mut weights: Vec<f32> = (first..=last)
                    .map(|bin| {
                        let offset = (bin as f32 * bin_hz - center) / sigma;
                        (-0.5 * offset * offset).exp()
                    })
                    .collect();

                let total: f32 = weights.iter().sum();
                if total > 0.0 {
                    weights.iter_mut().for_each(|w| *w /= total);
                }

                Band {
                    pitch_class: k % BINS_PER_OCTAVE,
                    first_bin: first,
                    weights,
                }
            })
            .collect();

        Self { bands, n_chroma }
    }

    /// Chroma of one power spectrum, scaled so its largest bin is 1
    ///
    /// A spectrum with no energy in any band yields all zeros.
    pub fn frame_chroma(&self, power: &[f32]) -> Vec<f32> {
        let mut chroma = vec![0.0f32; self.n_chroma];

        for band in &self.bands {
            let magnitude: f32 = power[band.first_bin..]
                .iter()
                .zip(band.weights.iter())
                .map(|(&p, &w)| p.sqrt() * w)
                .sum();
            chroma[band.pitch_class * self.n_chroma / BINS_PER_OCTAVE] += magnitude;
        }

        let peak = chroma.iter().fold(0.0f32, |acc, &c| acc.max(c));
        if peak > f32::MIN_POSITIVE {
            chroma.iter_mut().for_each(|c| *c /= peak);
        }
        chroma
    }
}
