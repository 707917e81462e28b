//! Onset strength, global tempo and beat positions.
//!
//! Tempo comes from the autocorrelation of a spectral-flux onset envelope,
//! weighted toward 120 BPM by a log-normal prior. Beats are then placed by
//! dynamic programming: each frame's score is its onset strength plus the
//! best predecessor roughly one period earlier, penalized by how far the gap
//! strays from the period.

/// Center of the tempo prior
const PRIOR_BPM: f64 = 120.0;

/// Width of the tempo prior in octaves
const PRIOR_OCTAVES: f64 = 1.0;

/// Onset strength per frame: mean positive change of the dB mel spectrum
///
/// The envelope is delayed by `window_size / (2 * hop_size)` frames so an
/// onset lines up with the frame centered on it rather than the first frame
/// whose window edge touches it.
pub fn onset_envelope(mel_db: &[Vec<f32>], window_size: usize, hop_size: usize) -> Vec<f32> {
    let n = mel_db.len();
    let mut envelope = vec![0.0f32; n];
    let delay = window_size / (2 * hop_size);

    for t in 1..n {
        let (prev, curr) = (&mel_db[t - 1], &mel_db[t]);
        let flux: f32 = curr
            .iter()
            .zip(prev.iter())
            .map(|(&c, &p)| (c - p).max(0.0))
            .sum::<f32>()
            / curr.len().max(1) as f32;

        if let Some(slot) = envelope.get_mut(t + delay) {
            *slot = flux;
        }
    }

    envelope
}

/// Frames per second of an envelope sampled every `hop_size` samples
fn frame_rate(sample_rate: u32, hop_size: usize) -> f64 {
    sample_rate as f64 / hop_size as f64
}

/// Global tempo estimate in BPM, or `None` if the envelope carries no onsets
pub fn estimate_tempo(
    envelope: &[f32],
    sample_rate: u32,
    hop_size: usize,
    min_bpm: f32,
    max_bpm: f32,
) -> Option<f32> {
    let fps = frame_rate(sample_rate, hop_size);
    // Only lags whose tempo lies inside the range
    let lag_min = ((60.0 * fps / max_bpm as f64).ceil() as usize).max(1);
    let lag_max = ((60.0 * fps / min_bpm as f64).floor() as usize).min(envelope.len().saturating_sub(1));
    if lag_min > lag_max {
        return None;
    }

    let autocorr = |lag: usize| -> f64 {
        envelope[lag..]
            .iter()
            .zip(envelope.iter())
            .map(|(&a, &b)| a as f64 * b as f64)
            .sum()
    };

    let energy = autocorr(0);
    if energy <= f64::EPSILON {
        return None;
    }

    let score = |lag: usize| -> f64 {
        let strength = (autocorr(lag) / energy).max(0.0);
        let bpm = 60.0 * fps / lag as f64;
        let prior = -0.5 * ((bpm / PRIOR_BPM).log2() / PRIOR_OCTAVES).powi(2);
        (1.0 + 1e6 * strength).ln() + prior
    };

    let scores: Vec<f64> = (lag_min..=lag_max).map(score).collect();
    let (best_idx, _) = scores
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &s)| if s > best.1 { (i, s) } else { best });

    // Parabolic refinement between neighboring lags
    let mut lag = (lag_min + best_idx) as f64;
    if best_idx > 0 && best_idx + 1 < scores.len() {
        let (a, b, c) = (scores[best_idx - 1], scores[best_idx], scores[best_idx + 1]);
        let denom = a - 2.0 * b + c;
        if denom.abs() > f64::EPSILON {
            lag += (0.5 * (a - c) / denom).clamp(-0.5, 0.5);
        }
    }

    // Refinement can step half a lag past either end
    let bpm = ((60.0 * fps / lag) as f32).max(min_bpm).min(max_bpm);
    tracing::debug!("Tempo estimate: {:.2} BPM (lag {:.2} frames)", bpm, lag);
    Some(bpm)
}

/// Beat frames for a known tempo, in increasing order
pub fn track_beats(
    envelope: &[f32],
    bpm: f32,
    sample_rate: u32,
    hop_size: usize,
    tightness: f32,
) -> Vec<usize> {
    let n = envelope.len();
    if n < 2 || bpm <= 0.0 {
        return Vec::new();
    }

    let period = 60.0 * frame_rate(sample_rate, hop_size) / bpm as f64;
    if period < 1.0 {
        return Vec::new();
    }

    let normalized = match normalize_by_std(envelope) {
        Some(values) => values,
        None => return Vec::new(),
    };
    let local_score = smooth_with_period(&normalized, period);

    // Predecessor offsets from 2 periods back to half a period back
    let back_far = (2.0 * period).round() as usize;
    let back_near = ((period / 2.0).round() as usize).max(1);
    let offsets: Vec<(usize, f64)> = (back_near..=back_far)
        .map(|back| {
            let ratio = back as f64 / period;
            (back, -(tightness as f64) * ratio.ln().powi(2))
        })
        .collect();

    let max_local = local_score.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut cumulative = vec![0.0f64; n];
    let mut backlink: Vec<Option<usize>> = vec![None; n];
    let mut first_beat = true;

    for i in 0..n {
        let mut best: Option<(usize, f64)> = None;
        for &(back, penalty) in &offsets {
            if back > i {
                continue;
            }
            let candidate = penalty + cumulative[i - back];
            if best.map_or(true, |(_, s)| candidate > s) {
                best = Some((i - back, candidate));
            }
        }

        // Quiet lead-in frames start fresh chains instead of linking back
        if first_beat && local_score[i] < 0.01 * max_local {
            cumulative[i] = local_score[i];
            continue;
        }

        match best {
            Some((prev, score)) => {
                cumulative[i] = local_score[i] + score.max(0.0);
                if score > 0.0 {
                    backlink[i] = Some(prev);
                }
            }
            None => cumulative[i] = local_score[i],
        }
        first_beat = false;
    }

    let Some(last) = last_beat(&cumulative) else {
        return Vec::new();
    };

    let mut beats = vec![last];
    let mut cursor = last;
    while let Some(prev) = backlink[cursor] {
        beats.push(prev);
        cursor = prev;
    }
    beats.reverse();

    trim_weak_beats(beats, &local_score)
}

/// Convert beat frames to seconds
pub fn frames_to_seconds(frames: &[usize], sample_rate: u32, hop_size: usize) -> Vec<f64> {
    let fps = frame_rate(sample_rate, hop_size);
    frames.iter().map(|&f| f as f64 / fps).collect()
}

fn normalize_by_std(envelope: &[f32]) -> Option<Vec<f64>> {
    let n = envelope.len() as f64;
    let mean = envelope.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance = envelope
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / (n - 1.0).max(1.0);
    let std = variance.sqrt();

    (std > f64::EPSILON).then(|| envelope.iter().map(|&v| v as f64 / std).collect())
}

/// Correlate with a Gaussian one period wide on each side
fn smooth_with_period(values: &[f64], period: f64) -> Vec<f64> {
    let half = period.round() as isize;
    let kernel: Vec<f64> = (-half..=half)
        .map(|k| (-0.5 * (k as f64 * 32.0 / period).powi(2)).exp())
        .collect();

    (0..values.len() as isize)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(j, &w)| {
                    let idx = i + j as isize - half;
                    (idx >= 0).then(|| values.get(idx as usize).map(|&v| v * w)).flatten()
                })
                .sum()
        })
        .collect()
}

/// Last local maximum of the cumulative score that clears half the median peak
fn last_beat(cumulative: &[f64]) -> Option<usize> {
    let n = cumulative.len();
    let is_peak = |i: usize| {
        let left = if i == 0 { f64::NEG_INFINITY } else { cumulative[i - 1] };
        let right = if i + 1 == n { f64::NEG_INFINITY } else { cumulative[i + 1] };
        cumulative[i] > left && cumulative[i] >= right
    };

    let mut peaks: Vec<f64> = (0..n).filter(|&i| is_peak(i)).map(|i| cumulative[i]).collect();
    if peaks.is_empty() {
        return None;
    }
    peaks.sort_by(|a, b| a.total_cmp(b));
    let median = peaks[peaks.len() / 2];

    (0..n).rev().find(|&i| is_peak(i) && cumulative[i] >= 0.5 * median)
}

/// Drop leading and trailing beats whose onset support is weak
fn trim_weak_beats(beats: Vec<usize>, local_score: &[f64]) -> Vec<usize> {
    if beats.is_empty() {
        return beats;
    }

    let strengths: Vec<f64> = beats.iter().map(|&b| local_score[b]).collect();
    let rms = (strengths.iter().map(|s| s * s).sum::<f64>() / strengths.len() as f64).sqrt();
    let threshold = 0.5 * rms;

    let start = strengths.iter().position(|&s| s >= threshold);
    let end = strengths.iter().rposition(|&s| s >= threshold);

    match (start, end) {
        (Some(start), Some(end)) => beats[start..=end].to_vec(),
        _ => Vec::new(),
    }
}
