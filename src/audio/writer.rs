use std::path::Path;

use crate::audio::types::AudioSignal;
use crate::audio::AudioSink;
use crate::error::{AudioError, Result};

/// Writes signals as 32-bit float mono WAV files
#[derive(Debug, Default, Clone, Copy)]
pub struct AudioWriter;

impl AudioWriter {
    pub fn new() -> Self {
        Self
    }

    /// Write `signal` to `path`, creating parent directories as needed
    pub fn write<P: AsRef<Path>>(path: P, signal: &AudioSignal) -> Result<()> {
        let path = path.as_ref();
        let write_failed = || AudioError::WriteFailed {
            path: path.display().to_string()
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: signal.sample_rate(),
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };

        let mut writer = hound::WavWriter::create(path, spec).map_err(|_| write_failed())?;
        for &sample in signal.samples() {
            writer.write_sample(sample).map_err(|_| write_failed())?;
        }
        writer.finalize().map_err(|_| write_failed())?;

        tracing::debug!("Wrote {} samples to {:?}", signal.len(), path);
        Ok(())
    }
}

impl AudioSink for AudioWriter {
    fn write(&self, path: &Path, signal: &AudioSignal) -> Result<()> {
        AudioWriter::write(path, signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioLoader;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("mix.wav");
        let signal = AudioSignal::new(vec![0.0, 0.5, -1.0, 0.25], 22050);

        AudioWriter::write(&path, &signal).unwrap();
        let loaded = AudioLoader::load(&path).unwrap();

        assert_eq!(loaded, signal);
    }
}
