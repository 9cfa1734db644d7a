//! Error handling for syncscope
//!
//! This module defines the error taxonomy shared by the transport, producers,
//! recorder, sink and playback engine, along with a Result alias.

use std::time::Duration;

use thiserror::Error;

/// Main error type for syncscope operations
#[derive(Error, Debug)]
pub enum SyncError {
    /// No stream was announced within the resolve budget.
    ///
    /// Not fatal: the recorder reports it and keeps going with zero inlets.
    #[error("No streams discovered within {0:?}")]
    DiscoveryEmpty(Duration),

    /// A pull from one inlet failed
    #[error("Pull failed on stream '{stream}': {message}")]
    PullFailure { stream: String, message: String },

    /// A record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The reference window has a non-positive dimension
    #[error("Invalid reference window {width}x{height}")]
    InvalidReference { width: f64, height: f64 },

    /// The companion video is missing or unreadable
    #[error("Video unavailable: {0}")]
    VideoUnavailable(String),

    /// Errors raised by the transport layer
    #[error("Transport error: {0}")]
    Transport(String),

    /// The producing side of a stream went away
    #[error("Stream '{0}' is closed")]
    StreamClosed(String),

    /// A stream with the same name and source id is already announced
    #[error("Stream '{name}' from '{source_id}' is already announced")]
    DuplicateStream { name: String, source_id: String },

    /// A sample did not match the stream's declared channel count
    #[error("Stream '{stream}' expects {expected} channels, got {actual}")]
    ChannelMismatch {
        stream: String,
        expected: usize,
        actual: usize,
    },

    /// Errors raised by an acquisition device
    #[error("Device error: {0}")]
    Device(String),

    /// Operation not valid in the current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record file written by a newer version
    #[error("Unsupported record schema version {0}")]
    UnsupportedSchema(u32),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<SyncError>,
    },
}

impl SyncError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        SyncError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &SyncError {
        match self {
            SyncError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the failure is local to one stream and recording may continue
    pub fn is_stream_local(&self) -> bool {
        matches!(
            self.root(),
            SyncError::PullFailure { .. } | SyncError::StreamClosed(_)
        )
    }
}

/// Result type alias for syncscope operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| SyncError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| SyncError::from(e).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::Device("board not found".to_string());
        assert_eq!(err.to_string(), "Device error: board not found");
    }

    #[test]
    fn test_error_with_context() {
        let err = SyncError::Serialization("bad payload".to_string());
        let with_ctx = err.with_context("Failed to save record");
        assert!(with_ctx.to_string().contains("Failed to save record"));
        assert!(matches!(with_ctx.root(), SyncError::Serialization(_)));
    }

    #[test]
    fn test_invalid_reference_display() {
        let err = SyncError::InvalidReference {
            width: 0.0,
            height: 1080.0,
        };
        assert!(err.to_string().contains("0x1080"));
    }

    #[test]
    fn test_stream_local_classification() {
        let pull = SyncError::PullFailure {
            stream: "Mouse".to_string(),
            message: "timeout".to_string(),
        };
        assert!(pull.is_stream_local());
        assert!(pull.with_context("tick").is_stream_local());
        assert!(!SyncError::Config("x".to_string()).is_stream_local());
    }

    #[test]
    fn test_io_context() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = res.context("opening record").unwrap_err();
        assert!(err.to_string().starts_with("opening record"));
    }
}
