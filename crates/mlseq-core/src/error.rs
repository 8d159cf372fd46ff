//! Error types for the conversion pipeline.

use thiserror::Error;

use crate::manifest::ModelFormat;

/// Result type for conversion operations.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Result type for registry and configuration operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// User-facing message shown when the model list cannot be fetched.
pub const SERVER_UNAVAILABLE_MESSAGE: &str = "Server error! Please try again later";

/// Errors that can occur while converting a chunk to audio.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConvertError {
    /// The request was cancelled by its owner. Never reported as a failure.
    #[error("conversion aborted")]
    Aborted,

    /// The service answered with a non-success status.
    #[error("conversion service returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The request could not be delivered or the body could not be read.
    #[error("conversion transport error: {0}")]
    Transport(String),

    /// The chunk could not be serialized into the model's payload format.
    #[error("failed to encode chunk payload: {0}")]
    Encode(String),

    /// No encoder is registered for the model's payload format.
    #[error("no payload encoder registered for format '{0}'")]
    UnsupportedFormat(ModelFormat),

    /// A conversion was attempted before a model was selected.
    #[error("no conversion model selected")]
    NoModel,
}

impl ConvertError {
    /// Returns true for the silent cancellation outcome.
    pub fn is_abort(&self) -> bool {
        matches!(self, ConvertError::Aborted)
    }

    /// Returns true if retrying the same request cannot succeed.
    pub fn is_deterministic(&self) -> bool {
        matches!(
            self,
            ConvertError::Encode(_) | ConvertError::UnsupportedFormat(_) | ConvertError::NoModel
        )
    }
}

/// Model discovery failure. Carries the message shown to the user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    /// Neither the primary nor the backup endpoint answered with a model list.
    #[error("{}", SERVER_UNAVAILABLE_MESSAGE)]
    Unavailable {
        /// Underlying cause, for logs.
        cause: String,
    },
}

impl DiscoveryError {
    /// The message to display at the point of model selection.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

/// Errors raised by the registry and configuration layers.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Index 0 is the conductor track and can never hold a pipeline.
    #[error("track index {0} is reserved")]
    ReservedTrack(usize),

    /// The index does not name an existing track.
    #[error("track index {index} out of range (track count {len})")]
    TrackOutOfRange {
        /// Requested index.
        index: usize,
        /// Current track count.
        len: usize,
    },

    /// A configuration file could not be interpreted.
    #[error("invalid configuration in {path}: {message}")]
    Config {
        /// Path of the offending file.
        path: String,
        /// Parse error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
