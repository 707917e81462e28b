use std::fmt;

use thiserror::Error;

/// Main error type for the track matcher
#[derive(Error, Debug)]
pub enum MatcherError {
    #[error("Audio processing error: {0}")]
    Audio(#[from] AudioError),

    #[error("Feature extraction error: {0}")]
    Feature(#[from] FeatureError),

    #[error("Matching error: {0}")]
    Match(#[from] MatchError),

    #[error("Mixing error: {0}")]
    Mix(#[from] MixError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{stage} failed for {path}: {source}")]
    Stage {
        stage: Stage,
        path: String,
        #[source]
        source: Box<MatcherError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Decoding, encoding and sample-level errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to load audio file: {path}")]
    LoadFailed { path: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Audio contains no samples")]
    Empty,

    #[error("Audio is silent (peak {peak:e})")]
    Silent { peak: f32 },

    #[error("Invalid audio parameters: {details}")]
    InvalidParameters { details: String },

    #[error("Failed to write audio file: {path}")]
    WriteFailed { path: String },

    #[error("Resampling failed: {reason}")]
    ResampleFailed { reason: String },
}

/// Feature comparison errors
#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Degenerate {feature} vector: {reason}")]
    Degenerate { feature: String, reason: String },

    #[error("Feature analysis failed: {reason}")]
    AnalysisFailed { reason: String },
}

/// Pool ranking errors
#[derive(Error, Debug)]
pub enum MatchError {
    #[error("No compatible track found within stretch limit {max_stretch} ({scanned} candidates scanned)")]
    NoCompatibleTrack { max_stretch: f32, scanned: usize },

    #[error("Pool directory not found: {path}")]
    PoolNotFound { path: String },
}

/// Final-stage mixing errors
#[derive(Error, Debug)]
pub enum MixError {
    #[error("Mix contains no signal")]
    Silent,

    #[error("Sample rate mismatch: {left} Hz vs {right} Hz")]
    SampleRateMismatch { left: u32, right: u32 },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Pipeline stage a fatal error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReferenceAnalysis,
    PoolScan,
    TempoAlignment,
    PhaseAlignment,
    Mixing,
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ReferenceAnalysis => "Reference analysis",
            Stage::PoolScan => "Pool scan",
            Stage::TempoAlignment => "Tempo alignment",
            Stage::PhaseAlignment => "Beat phase alignment",
            Stage::Mixing => "Mixing",
            Stage::Export => "Export",
        };
        f.write_str(name)
    }
}

/// Convenience type alias for Results using MatcherError
pub type Result<T> = std::result::Result<T, MatcherError>;

impl MatcherError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Attach the failing stage and file to an error
    pub fn at_stage<S: Into<String>>(self, stage: Stage, path: S) -> Self {
        Self::Stage {
            stage,
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, looking through stage wrappers
    pub fn root(&self) -> &MatcherError {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if a pool scan can continue past this error
    ///
    /// Decode failures and degenerate features only disqualify the one
    /// candidate they came from.
    pub fn is_recoverable(&self) -> bool {
        match self.root() {
            Self::Io(_) => true,
            Self::Audio(AudioError::LoadFailed { .. })
            | Self::Audio(AudioError::UnsupportedFormat { .. })
            | Self::Audio(AudioError::Empty)
            | Self::Audio(AudioError::Silent { .. }) => true,
            Self::Feature(_) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Stage { stage, path, source } => {
                format!("{} failed for '{}': {}", stage, path, source.user_message())
            }
            Self::Audio(AudioError::LoadFailed { path }) => {
                format!("Could not load audio file '{}'. Please check the file exists and is a supported format.", path)
            }
            Self::Audio(AudioError::Silent { .. }) => {
                "The audio is silent; there is nothing to match against.".to_string()
            }
            Self::Match(MatchError::NoCompatibleTrack { max_stretch, .. }) => {
                format!(
                    "No track in the pool is within ±{:.0}% of the reference tempo. Try raising max_stretch.",
                    max_stretch * 100.0
                )
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}
