use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for a matching run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the candidate pool
    pub pool_dir: PathBuf,

    /// Reference track, excluded from the pool scan
    pub track_a: PathBuf,

    /// Where the mixed output is written
    pub out_path: PathBuf,

    /// Feature extraction settings
    pub features: FeatureConfig,

    /// Scoring and ranking settings
    pub matching: MatchConfig,

    /// Time-stretch settings
    pub stretch: StretchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_dir: PathBuf::from("./pool"),
            track_a: PathBuf::from("./pool/track_A.wav"),
            out_path: PathBuf::from("synced_mix.wav"),
            features: FeatureConfig::default(),
            matching: MatchConfig::default(),
            stretch: StretchConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;
        self.matching.validate()?;
        self.stretch.validate()?;
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Feature extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Number of cepstral coefficients in the timbre vector
    pub n_mfcc: usize,

    /// Number of pitch classes in the harmony vector
    pub n_chroma: usize,

    /// Mel bands feeding the cepstrum and the onset envelope
    pub n_mels: usize,

    /// STFT window for timbre and onsets
    pub window_size: usize,

    /// Hop between analysis frames
    pub hop_size: usize,

    /// Longer STFT window for the chroma bands, so low notes resolve
    pub chroma_window_size: usize,

    /// Lowest tempo considered
    pub min_bpm: f32,

    /// Highest tempo considered
    pub max_bpm: f32,

    /// Tempo reported when a track has no onset energy at all
    pub fallback_bpm: f32,

    /// How strongly beat tracking sticks to the estimated period
    pub tightness: f32,

    /// Peak amplitude at or below which a track counts as silent
    pub silence_threshold: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            n_mfcc: 13,
            n_chroma: 12,
            n_mels: 128,
            window_size: 2048,
            hop_size: 512,
            chroma_window_size: 8192,
            min_bpm: 40.0,
            max_bpm: 240.0,
            fallback_bpm: 120.0,
            tightness: 100.0,
            silence_threshold: 1e-6,
        }
    }
}

impl FeatureConfig {
    fn validate(&self) -> Result<()> {
        if self.n_mfcc == 0 || self.n_mfcc > self.n_mels {
            return Err(invalid("features.n_mfcc", self.n_mfcc).into());
        }

        // Chroma bins are folded from semitone bands, so only divisors of 12 work
        if self.n_chroma == 0 || 12 % self.n_chroma != 0 {
            return Err(invalid("features.n_chroma", self.n_chroma).into());
        }

        for (key, size) in [
            ("features.window_size", self.window_size),
            ("features.chroma_window_size", self.chroma_window_size),
        ] {
            if size == 0 || !size.is_power_of_two() {
                return Err(invalid(key, size).into());
            }
        }

        if self.hop_size == 0 || self.hop_size > self.window_size {
            return Err(invalid("features.hop_size", self.hop_size).into());
        }

        if self.min_bpm <= 0.0 || self.min_bpm >= self.max_bpm {
            return Err(invalid("features.bpm_range", format!("{}-{}", self.min_bpm, self.max_bpm)).into());
        }

        if self.fallback_bpm <= 0.0 {
            return Err(invalid("features.fallback_bpm", self.fallback_bpm).into());
        }

        Ok(())
    }
}

/// Weights of the composite score terms
///
/// They are not required to sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub timbre: f32,
    pub harmony: f32,
    pub tempo: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            timbre: 0.5,
            harmony: 0.3,
            tempo: 0.2,
        }
    }
}

/// Scoring and ranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Largest relative tempo change a candidate may need (0.15 = ±15%)
    pub max_stretch: f32,

    /// How many ranked candidates to report
    pub top_n: usize,

    /// Composite score weights
    pub weights: ScoreWeights,

    /// Score candidates on a thread pool
    pub parallel_scan: bool,

    /// Worker threads for the parallel scan
    pub scan_threads: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_stretch: 0.15,
            top_n: 5,
            weights: ScoreWeights::default(),
            parallel_scan: true,
            scan_threads: num_cpus::get(),
        }
    }
}

impl MatchConfig {
    fn validate(&self) -> Result<()> {
        if !self.max_stretch.is_finite() || !(0.0..1.0).contains(&self.max_stretch) {
            return Err(invalid("matching.max_stretch", self.max_stretch).into());
        }

        let weights = [self.weights.timbre, self.weights.harmony, self.weights.tempo];
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(invalid(
                "matching.weights",
                format!("{}/{}/{}", weights[0], weights[1], weights[2]),
            ).into());
        }

        if self.parallel_scan && self.scan_threads == 0 {
            return Err(invalid("matching.scan_threads", self.scan_threads).into());
        }

        Ok(())
    }
}

/// Phase vocoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StretchConfig {
    /// STFT window
    pub window_size: usize,

    /// Synthesis hop
    pub hop_size: usize,
}

impl Default for StretchConfig {
    fn default() -> Self {
        Self {
            window_size: 2048,
            hop_size: 512,
        }
    }
}

impl StretchConfig {
    fn validate(&self) -> Result<()> {
        if self.window_size == 0 || !self.window_size.is_power_of_two() {
            return Err(invalid("stretch.window_size", self.window_size).into());
        }

        // Hann overlap-add needs at least 50% overlap to stay smooth
        if self.hop_size == 0 || self.hop_size > self.window_size / 2 {
            return Err(invalid("stretch.hop_size", self.hop_size).into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.features.n_mfcc, 13);
        assert_eq!(config.features.n_chroma, 12);
        assert_eq!(config.matching.max_stretch, 0.15);
        assert_eq!(config.matching.top_n, 5);
        assert_eq!(config.matching.weights, ScoreWeights { timbre: 0.5, harmony: 0.3, tempo: 0.2 });
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let mut original_config = Config::default();
        original_config.matching.max_stretch = 0.08;
        original_config.out_path = PathBuf::from("mix/out.wav");

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(loaded_config.matching.max_stretch, 0.08);
        assert_eq!(loaded_config.out_path, PathBuf::from("mix/out.wav"));
        assert_eq!(original_config.features.hop_size, loaded_config.features.hop_size);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(
            &file_path,
            "pool_dir = \"songs\"\n\n[matching.weights]\ntimbre = 1.0\n",
        ).unwrap();

        let config = Config::from_file(&file_path).unwrap();
        assert_eq!(config.pool_dir, PathBuf::from("songs"));
        assert_eq!(config.matching.weights.timbre, 1.0);
        assert_eq!(config.matching.weights.harmony, 0.3);
        assert_eq!(config.matching.top_n, 5);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file("/definitely/not/here.toml");
        assert!(matches!(
            result,
            Err(crate::error::MatcherError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_invalid_max_stretch() {
        let mut config = Config::default();
        config.matching.max_stretch = -0.1;
        assert!(config.validate().is_err());

        config.matching.max_stretch = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_bpm_range() {
        let mut config = Config::default();
        config.features.min_bpm = 150.0;
        config.features.max_bpm = 100.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_chroma_bins() {
        let mut config = Config::default();
        config.features.n_chroma = 5;
        assert!(config.validate().is_err());
    }
}
