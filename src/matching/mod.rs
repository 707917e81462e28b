//! # Matching
//!
//! Compares pool tracks with the reference and ranks them.
//!
//! A candidate is only considered when its tempo is within `max_stretch` of
//! the reference; everything else is excluded outright rather than
//! penalized. Feasible candidates are ranked by
//!
//! ```text
//! w_timbre * cos(mfcc_ref, mfcc) + w_harmony * cos(chroma_ref, chroma) + w_tempo * (1 - tempo_ratio)
//! ```

pub mod ranker;
pub mod scorer;

pub use ranker::{Candidate, InfeasibleTrack, PoolRanker, RankedPool, ScanOutcome, SkippedTrack};
pub use scorer::{cosine_similarity, tempo_ratio, CompatibilityScorer, ScoreBreakdown, ScoreOutcome};
