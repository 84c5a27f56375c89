//! Error types and result utilities for crosswalk detection.

use thiserror::Error;

/// Convenience type alias for results that may contain a [`CrosswalkError`].
pub type CrosswalkResult<T> = Result<T, CrosswalkError>;

/// Error types that can occur while loading, analysing or labelling a clip.
#[derive(Error, Debug)]
pub enum CrosswalkError {
    /// A configuration value or function argument is out of its valid domain.
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    /// The audio buffer failed the validity check (empty rate, non-finite samples, ...).
    #[error("Invalid audio: {reason}")]
    InvalidAudio {
        /// Why the buffer was rejected.
        reason: String,
    },

    /// The audio file could not be decoded.
    #[error("Audio decoding error: {0}")]
    Decode(String),

    /// I/O failure, typically while writing a label file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Processing was cancelled cooperatively before `stage` could run.
    #[error("Detection cancelled before stage '{stage}'")]
    Cancelled {
        /// Name of the stage that was about to run.
        stage: &'static str,
    },
}

impl CrosswalkError {
    /// Create an invalid-audio error.
    pub fn invalid_audio(reason: impl Into<String>) -> Self {
        Self::InvalidAudio {
            reason: reason.into(),
        }
    }

    /// True when the error came from a cancellation request.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl From<hound::Error> for CrosswalkError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(io) => Self::Io(io),
            other => Self::Decode(other.to_string()),
        }
    }
}

/// Error describing an invalid parameter.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid parameter '{parameter}': {reason}")]
pub struct ParameterError {
    /// Name of the offending parameter.
    pub parameter: String,
    /// Human readable explanation.
    pub reason: String,
}

impl ParameterError {
    /// Build an error for `parameter` with the given `reason`.
    pub fn invalid_value(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Build an error for a value that must lie in `[min, max]`.
    pub fn out_of_range<V: std::fmt::Display>(
        parameter: impl Into<String>,
        value: V,
        min: V,
        max: V,
    ) -> Self {
        Self::invalid_value(
            parameter,
            format!("value {value} is outside the allowed range [{min}, {max}]"),
        )
    }
}
