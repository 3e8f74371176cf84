//! Error types for Sessiontap

use std::io;
use thiserror::Error;

/// Result type for Sessiontap operations
pub type Result<T> = std::result::Result<T, TapError>;

/// Errors that can occur in Sessiontap
#[derive(Debug, Error)]
pub enum TapError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Display or microphone capture was refused
    #[error("capture could not start: permission denied or unsupported ({0})")]
    PermissionDenied(String),

    /// None of the preferred container/codec combinations is supported
    #[error("capture could not start: permission denied or unsupported (no supported recording format among {0:?})")]
    UnsupportedFormat(Vec<String>),

    /// Media pipeline failure outside of acquisition
    #[error("Media error: {0}")]
    Media(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Web storage rejected an operation
    #[error("Storage error: {0}")]
    Storage(String),

    /// IndexedDB rejected an operation
    #[error("IndexedDB error: {0}")]
    IndexedDb(String),

    /// Network request failed
    #[error("Network error: {0}")]
    Network(String),

    /// Request/response too large
    #[error("Data too large: {size} bytes exceeds limit of {limit} bytes")]
    DataTooLarge {
        /// Actual size
        size: usize,
        /// Size limit
        limit: usize,
    },

    /// Replay source could not be turned into something playable
    #[error("Invalid replay source: {0}")]
    InvalidSource(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl TapError {
    /// Whether this error means capture never started (permission or codec)
    #[must_use]
    pub fn is_acquisition(&self) -> bool {
        matches!(self, Self::PermissionDenied(_) | Self::UnsupportedFormat(_))
    }
}
