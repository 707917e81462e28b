//! # Audio I/O Module
//!
//! Decoding, encoding and sample-rate conversion around the matching core.
//! The core only sees [`AudioSignal`] values; files come in through an
//! [`AudioSource`] and the finished mix leaves through an [`AudioSink`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use track_matcher::audio::{AudioLoader, AudioWriter};
//!
//! # fn main() -> anyhow::Result<()> {
//! let signal = AudioLoader::load("song.flac")?;
//! println!("{:.1}s at {} Hz", signal.duration(), signal.sample_rate());
//! AudioWriter::write("copy.wav", &signal)?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use crate::error::Result;

pub mod loader;
pub mod resample;
pub mod types;
pub mod writer;

pub use loader::AudioLoader;
pub use resample::Resampler;
pub use types::{AudioData, AudioSignal};
pub use writer::AudioWriter;

/// Anything that can turn a path into a mono signal
pub trait AudioSource: Send + Sync {
    fn load(&self, path: &Path) -> Result<AudioSignal>;
}

/// Destination for the finished mix
pub trait AudioSink: Send + Sync {
    fn write(&self, path: &Path, signal: &AudioSignal) -> Result<()>;
}
