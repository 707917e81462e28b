use crate::config::ScoreWeights;
use crate::error::{FeatureError, Result};
use crate::features::TrackFeatures;

/// Cosine similarity of two feature vectors, `1 - cosine_distance`
///
/// Zero-norm, non-finite or mismatched vectors are reported as
/// [`FeatureError::Degenerate`] instead of producing NaN.
pub fn cosine_similarity(feature: &str, a: &[f32], b: &[f32]) -> Result<f32> {
    let degenerate = |reason: String| FeatureError::Degenerate {
        feature: feature.to_string(),
        reason,
    };

    if a.len() != b.len() {
        return Err(degenerate(format!("length mismatch ({} vs {})", a.len(), b.len())).into());
    }
    if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return Err(degenerate("non-finite component".to_string()).into());
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x as f64 * y as f64;
        norm_a += x as f64 * x as f64;
        norm_b += y as f64 * y as f64;
    }

    if norm_a <= f64::EPSILON || norm_b <= f64::EPSILON {
        return Err(degenerate("zero-norm vector".to_string()).into());
    }

    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())) as f32)
}

/// Relative tempo change needed to bring `tempo` to `reference`
pub fn tempo_ratio(reference_bpm: f32, bpm: f32) -> f32 {
    (1.0 - bpm / reference_bpm).abs()
}

/// Sub-scores and composite of a feasible candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub timbre: f32,
    pub harmony: f32,
    pub tempo_ratio: f32,
    pub composite: f32,
}

/// Result of comparing one candidate to the reference
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreOutcome {
    Feasible(ScoreBreakdown),

    /// Would need more stretch than allowed
    Infeasible { tempo_ratio: f32 },
}

impl ScoreOutcome {
    pub fn breakdown(&self) -> Option<&ScoreBreakdown> {
        match self {
            Self::Feasible(breakdown) => Some(breakdown),
            Self::Infeasible { .. } => None,
        }
    }
}

/// Weighted timbre, harmony and tempo similarity behind a tempo gate
#[derive(Debug, Clone, Copy)]
pub struct CompatibilityScorer {
    weights: ScoreWeights,
    max_stretch: f32,
}

impl CompatibilityScorer {
    pub fn new(weights: ScoreWeights, max_stretch: f32) -> Self {
        Self { weights, max_stretch }
    }

    pub fn max_stretch(&self) -> f32 {
        self.max_stretch
    }

    /// Score `candidate` against `reference`
    ///
    /// The tempo gate is checked first, so an infeasible candidate is never
    /// rejected for degenerate spectra.
    pub fn score(&self, reference: &TrackFeatures, candidate: &TrackFeatures) -> Result<ScoreOutcome> {
        let ratio = tempo_ratio(reference.tempo.bpm, candidate.tempo.bpm);
        if !ratio.is_finite() || ratio > self.max_stretch {
            return Ok(ScoreOutcome::Infeasible { tempo_ratio: ratio });
        }

        let timbre = cosine_similarity("timbre", &reference.timbre, &candidate.timbre)?;
        let harmony = cosine_similarity("harmony", &reference.harmony, &candidate.harmony)?;
        let composite = self.weights.timbre * timbre
            + self.weights.harmony * harmony
            + self.weights.tempo * (1.0 - ratio);

        Ok(ScoreOutcome::Feasible(ScoreBreakdown {
            timbre,
            harmony,
            tempo_ratio: ratio,
            composite,
        }))
    }
}
