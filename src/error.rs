//! Unified error handling for the route-playback library.
//!
//! The algorithms themselves are total: simplification, pass detection and
//! playback ticking never fail. Errors only surface at the edges, when a
//! configuration is rejected, when host-supplied JSON cannot be decoded, or
//! when a background job is abandoned.

use thiserror::Error;

/// Unified error type for route-playback operations.
#[derive(Debug, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error), uniffi(flat_error))]
pub enum PlaybackError {
    /// A configuration value is outside its valid range
    #[error("Configuration error: {message}")]
    InvalidConfig { message: String },

    /// Input handed over by the host could not be decoded
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// A background job was cancelled before it produced a result
    #[error("Operation cancelled")]
    Cancelled,

    /// An FFI call arrived before a playback session was configured
    #[error("No playback session configured")]
    NoSession,
}

impl PlaybackError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        PlaybackError::InvalidConfig {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for PlaybackError {
    fn from(err: serde_json::Error) -> Self {
        PlaybackError::InvalidInput {
            message: err.to_string(),
        }
    }
}

/// Result type alias for route-playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
