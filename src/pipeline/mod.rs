//! # Mashup Pipeline
//!
//! The engine ties analysis, ranking and synchronization together and turns
//! a pool directory plus a reference track into one beat-synced mix.

pub mod engine;

pub use engine::{list_pool, MashupEngine, MashupResult, MatchReport};
