use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::types::{AudioData, AudioSignal};
use crate::audio::AudioSource;
use crate::error::{AudioError, Result};

/// Audio file decoder supporting WAV and the common compressed formats
///
/// Every file is collapsed to mono on load.
#[derive(Debug, Default, Clone, Copy)]
pub struct AudioLoader;

impl AudioLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load an audio file as a mono signal
    pub fn load<P: AsRef<Path>>(path: P) -> Result<AudioSignal> {
        let path = path.as_ref();
        let data = Self::load_data(path)?;

        if data.samples.is_empty() {
            return Err(AudioError::Empty.into());
        }

        tracing::debug!(
            "Loaded {:?}: {:.1}s, {} Hz, {} channels",
            path, data.duration(), data.sample_rate, data.channels
        );

        Ok(data.into_signal())
    }

    /// Decode an audio file keeping its channel layout
    pub fn load_data<P: AsRef<Path>>(path: P) -> Result<AudioData> {
        let path = path.as_ref();
        let extension = Self::detect_format(path).unwrap_or_default();

        match extension.as_str() {
            "wav" => Self::load_wav(path),
            "mp3" | "flac" | "ogg" | "m4a" | "aac" => Self::load_with_symphonia(path),
            _ => Err(AudioError::UnsupportedFormat {
                format: extension
            }.into()),
        }
    }

    /// Load WAV files using the hound crate (most reliable for WAV)
    fn load_wav(path: &Path) -> Result<AudioData> {
        let load_failed = || AudioError::LoadFailed {
            path: path.display().to_string()
        };

        let reader = hound::WavReader::open(path).map_err(|_| load_failed())?;

        let spec = reader.spec();

        let samples = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| load_failed())?,
            hound::SampleFormat::Int => {
                let bit_depth = spec.bits_per_sample;
                reader
                    .into_samples::<i32>()
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|_| load_failed())?
                    .into_iter()
                    .map(|sample| Self::int_to_float(sample, bit_depth))
                    .collect()
            }
        };

        Ok(AudioData {
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            file_path: path.to_path_buf(),
        })
    }

    /// Load compressed formats using Symphonia
    fn load_with_symphonia(path: &Path) -> Result<AudioData> {
        let load_failed = || AudioError::LoadFailed {
            path: path.display().to_string()
        };

        let file = File::open(path).map_err(|_| load_failed())?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension_str) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension_str);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &fmt_opts, &meta_opts)
            .map_err(|_| load_failed())?;

        let mut format = probed.format;

        // First audio track with a decodable codec
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(load_failed)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params.sample_rate
            .ok_or_else(|| AudioError::InvalidParameters {
                details: format!("No sample rate found in {}", path.display())
            })?;

        let dec_opts: DecoderOptions = Default::default();
        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &dec_opts)
            .map_err(|_| load_failed())?;

        let mut samples = Vec::new();
        let mut channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(0);

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                // End of stream surfaces as an IO error
                Err(_) => break,
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    channels = spec.channels.count() as u16;

                    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buffer.samples());
                }
                Err(SymphoniaError::DecodeError(err)) => {
                    tracing::debug!("Skipping corrupt packet in {:?}: {}", path, err);
                    continue;
                }
                Err(_) => break,
            }
        }

        if channels == 0 {
            return Err(AudioError::InvalidParameters {
                details: format!("No channel information found in {}", path.display())
            }.into());
        }

        Ok(AudioData {
            samples,
            sample_rate,
            channels,
            file_path: path.to_path_buf(),
        })
    }

    /// Convert integer sample to float (-1.0 to 1.0)
    fn int_to_float(sample: i32, bit_depth: u16) -> f32 {
        match bit_depth {
            8 => sample as f32 / 128.0,
            16 => sample as f32 / 32768.0,
            24 => sample as f32 / 8388608.0,
            32 => sample as f32 / 2147483648.0,
            _ => sample as f32 / 32768.0, // Default to 16-bit
        }
    }

    /// Detect audio format from file extension
    pub fn detect_format<P: AsRef<Path>>(path: P) -> Option<String> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    /// Check if a file format is supported
    pub fn is_format_supported(extension: &str) -> bool {
        matches!(
            extension.to_lowercase().as_str(),
            "wav" | "mp3" | "flac" | "ogg" | "m4a" | "aac"
        )
    }
}

impl AudioSource for AudioLoader {
    fn load(&self, path: &Path) -> Result<AudioSignal> {
        AudioLoader::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MatcherError;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_test_wav(path: &Path, channels: u16, frames: &[[i16; 2]]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for frame in frames {
            for sample in frame.iter().take(channels as usize) {
                writer.write_sample(*sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(AudioLoader::detect_format("test.wav"), Some("wav".to_string()));
        assert_eq!(AudioLoader::detect_format("test.MP3"), Some("mp3".to_string()));
        assert_eq!(AudioLoader::detect_format("test"), None);
    }

    #[test]
    fn test_format_support() {
        assert!(AudioLoader::is_format_supported("wav"));
        assert!(AudioLoader::is_format_supported("FLAC"));
        assert!(!AudioLoader::is_format_supported("xyz"));
    }

    #[test]
    fn test_int_to_float_conversion() {
        assert_eq!(AudioLoader::int_to_float(0, 16), 0.0);
        assert_eq!(AudioLoader::int_to_float(32767, 16), 32767.0 / 32768.0);
        assert_eq!(AudioLoader::int_to_float(-32768, 16), -1.0);
        assert_eq!(AudioLoader::int_to_float(-128, 8), -1.0);
    }

    #[test]
    fn test_stereo_wav_is_downmixed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_test_wav(&path, 2, &[[16384, 0], [-16384, -16384]]);

        let signal = AudioLoader::load(&path).unwrap();
        assert_eq!(signal.sample_rate(), 8000);
        assert_eq!(signal.samples(), &[0.25, -0.5]);
    }

    #[test]
    fn test_empty_wav_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        write_test_wav(&path, 1, &[]);

        let result = AudioLoader::load(&path);
        assert!(matches!(result, Err(MatcherError::Audio(AudioError::Empty))));
    }

    #[test]
    fn test_unsupported_format() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("test.xyz");

        let mut file = File::create(&file_path).unwrap();
        file.write_all(b"dummy content").unwrap();

        match AudioLoader::load(&file_path) {
            Err(MatcherError::Audio(AudioError::UnsupportedFormat { format })) => {
                assert_eq!(format, "xyz");
            }
            other => panic!("Expected UnsupportedFormat error, got {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_wav_fails_to_load() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("broken.wav");
        std::fs::write(&file_path, b"RIFF nope").unwrap();

        let result = AudioLoader::load(&file_path);
        assert!(matches!(result, Err(MatcherError::Audio(AudioError::LoadFailed { .. }))));
    }
}
