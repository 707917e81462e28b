//! # Synchronization
//!
//! Everything applied to the chosen candidate after ranking:
//!
//! 1. [`TempoAligner`] time-stretches it to the reference tempo
//! 2. [`BeatPhaseAligner`] shifts it so the first beats coincide
//! 3. [`Mixer`] sums it with the reference and peak-normalizes

pub mod mixer;
pub mod phase;
pub mod stretch;

pub use mixer::Mixer;
pub use phase::BeatPhaseAligner;
pub use stretch::TempoAligner;
