//! # Track Matcher
//!
//! Pick the track from a pool that fits a reference best, then mix the two
//! into a tempo-synchronized, beat-aligned mashup.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use track_matcher::{config::Config, pipeline::MashupEngine};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let mut config = Config::default();
//! config.pool_dir = "songs/".into();
//! config.track_a = "songs/reference.wav".into();
//!
//! let result = MashupEngine::new(config).run().await?;
//! println!("{}", result.report);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - [`audio`] - Decoding, WAV export and resampling
//! - [`features`] - MFCC timbre, chroma harmony, tempo and beats
//! - [`matching`] - Compatibility scoring and pool ranking
//! - [`sync`] - Time-stretching, beat alignment and mixing
//! - [`pipeline`] - The end-to-end mashup engine
//! - [`config`] - Configuration management

pub mod audio;
pub mod config;
pub mod error;
pub mod features;
pub mod matching;
pub mod pipeline;
pub mod sync;

// Re-export commonly used types for convenience
pub use crate::{
    audio::AudioSignal,
    config::Config,
    error::{MatcherError, Result},
    features::{FeatureExtractor, TrackFeatures},
    matching::{CompatibilityScorer, PoolRanker, RankedPool},
    pipeline::{MashupEngine, MashupResult},
    sync::{BeatPhaseAligner, Mixer, TempoAligner},
};
