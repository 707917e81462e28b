//! Mel filterbank, log-mel spectrogram and the time-averaged cepstrum.

/// Dynamic range kept below the loudest mel cell
const TOP_DB: f32 = 80.0;

/// Power floor before taking logs
const AMIN: f32 = 1e-10;

/// Hz to mel, Slaney scale (linear below 1 kHz, logarithmic above)
pub fn hz_to_mel(hz: f32) -> f32 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = 6.4f32.ln() / 27.0;

    if hz >= min_log_hz {
        min_log_mel + (hz / min_log_hz).ln() / logstep
    } else {
        hz / f_sp
    }
}

/// Inverse of [`hz_to_mel`]
pub fn mel_to_hz(mel: f32) -> f32 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = 6.4f32.ln() / 27.0;

    if mel >= min_log_mel {
        min_log_hz * (logstep * (mel - min_log_mel)).exp()
    } else {
        mel * f_sp
    }
}

/// Triangular mel filters over FFT bins, area-normalized
pub struct MelFilterBank {
    /// Per band: first bin and the weights starting there
    filters: Vec<(usize, Vec<f32>)>,
}

impl MelFilterBank {
    pub fn new(n_mels: usize, sample_rate: u32, window_size: usize) -> Self {
        let num_bins = window_size / 2 + 1;
        let nyquist = sample_rate as f32 / 2.0;
        let bin_hz = sample_rate as f32 / window_size as f32;

        let mel_max = hz_to_mel(nyquist);
        let edges: Vec<f32> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_max * i as f32 / (n_mels + 1) as f32))
            .collect();

        let filters = (0..n_mels)
            .map(|m| {
                let (lower, center, upper) = (edges[m], edges[m + 1], edges[m + 2]);
                let norm = 2.0 / (upper - lower);

                let first = (lower / bin_hz).ceil() as usize;
                let last = ((upper / bin_hz).floor() as usize).min(num_bins - 1);

                let weights = (first..=last.max(first))
                    .map(|bin| {
                        let freq = bin as f32 * bin_hz;
                        let rising = (freq - lower) / (center - lower);
                        let falling = (upper - freq) / (upper - center);
                        rising.min(falling).max(0.0) * norm
                    })
                    .collect();

                (first.min(num_bins - 1), weights)
            })
            .collect();

        Self { filters }
    }

    pub fn num_bands(&self) -> usize {
        self.filters.len()
    }

    /// Mel band energies of one power spectrum
    pub fn apply(&self, power: &[f32]) -> Vec<f32> {
        self.filters
            .iter()
            .map(|(first, weights)| {
                power[*first..]
                    .iter()
                    .zip(weights.iter())
                    .map(|(&p, &w)| p * w)
                    .sum()
            })
            .collect()
    }
}

/// Convert mel power frames to decibels in place, clipped to `TOP_DB` below the peak
pub fn power_to_db(frames: &mut [Vec<f32>]) {
    let mut peak = f32::NEG_INFINITY;
    for value in frames.iter_mut().flat_map(|f| f.iter_mut()) {
        *value = 10.0 * value.max(AMIN).log10();
        peak = peak.max(*value);
    }

    let floor = peak - TOP_DB;
    for value in frames.iter_mut().flat_map(|f| f.iter_mut()) {
        *value = value.max(floor);
    }
}

/// Orthonormal DCT-II basis: `n_coeffs` rows of `n_inputs` weights
pub fn dct_basis(n_coeffs: usize, n_inputs: usize) -> Vec<Vec<f32>> {
    let n = n_inputs as f32;
    (0..n_coeffs)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..n_inputs)
                .map(|i| scale * (std::f32::consts::PI * k as f32 * (i as f32 + 0.5) / n).cos())
                .collect()
        })
        .collect()
}

/// Cepstral coefficients of every dB mel frame, averaged over time
pub fn mean_mfcc(mel_db: &[Vec<f32>], n_mfcc: usize) -> Vec<f32> {
    let mut mean = vec![0.0f32; n_mfcc];
    let Some(first) = mel_db.first() else {
        return mean;
    };

    let basis = dct_basis(n_mfcc, first.len());
    for frame in mel_db {
        for (acc, row) in mean.iter_mut().zip(basis.iter()) {
            *acc += row.iter().zip(frame.iter()).map(|(&b, &x)| b * x).sum::<f32>();
        }
    }

    let count = mel_db.len() as f32;
    mean.iter_mut().for_each(|c| *c /= count);
    mean
}
