//! Domain-specific error types for the pixwire protocol.
//!
//! All fallible operations return `Result<T, PixwireError>`.
//! No panics on invalid input; every error is typed and recoverable,
//! and every error is local to the connection that produced it.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the pixwire service.
#[derive(Debug, Error)]
pub enum PixwireError {
    // ── Framing Errors ───────────────────────────────────────────
    /// The stream closed before the declared frame length was satisfied.
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    /// The declared (or requested) frame length exceeds the ceiling.
    #[error("invalid frame length: {size} bytes (max {max})")]
    LengthInvalid { size: usize, max: usize },

    /// A frame arrived when the connection was not expecting one.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    // ── Parse Errors ─────────────────────────────────────────────
    /// A command string could not be parsed.
    #[error("invalid command: {0}")]
    Parse(String),

    /// The command frame was not valid UTF-8.
    #[error("invalid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    // ── Codec Errors ─────────────────────────────────────────────
    /// The image bytes could not be decoded or encoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The image is in a format the service does not handle.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    // ── Parameter Errors ─────────────────────────────────────────
    /// A transform parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    // ── Transport Errors ─────────────────────────────────────────
    /// Writing a frame failed and could not be recovered.
    #[error("write error: {0}")]
    Write(#[source] std::io::Error),

    /// The TCP/IO layer reported an error.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// A read or write exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// A blocking job panicked or was cancelled.
    #[error("worker failure: {0}")]
    Worker(String),

    /// The dispatch queue was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,
}

// ── ErrorCategory ────────────────────────────────────────────────

/// Coarse classification used for logging and client messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Framing,
    Parse,
    Codec,
    InvalidParameter,
    Transport,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Framing => write!(f, "framing"),
            ErrorCategory::Parse => write!(f, "parse"),
            ErrorCategory::Codec => write!(f, "codec"),
            ErrorCategory::InvalidParameter => write!(f, "invalid-parameter"),
            ErrorCategory::Transport => write!(f, "transport"),
        }
    }
}

impl PixwireError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PixwireError::ShortRead { .. }
            | PixwireError::LengthInvalid { .. }
            | PixwireError::ProtocolViolation(_) => ErrorCategory::Framing,
            PixwireError::Parse(_) | PixwireError::InvalidUtf8(_) => ErrorCategory::Parse,
            PixwireError::Codec(_) | PixwireError::UnsupportedFormat(_) => ErrorCategory::Codec,
            PixwireError::InvalidParameter(_) => ErrorCategory::InvalidParameter,
            PixwireError::Write(_)
            | PixwireError::Io(_)
            | PixwireError::Timeout(_)
            | PixwireError::Worker(_)
            | PixwireError::ChannelClosed => ErrorCategory::Transport,
        }
    }

    /// Shorthand for building an `InvalidParameter` error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        PixwireError::InvalidParameter(msg.into())
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<image::ImageError> for PixwireError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::Unsupported(u) => PixwireError::UnsupportedFormat(u.to_string()),
            image::ImageError::Limits(l) => {
                PixwireError::InvalidParameter(format!("image too large: {l}"))
            }
            other => PixwireError::Codec(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for PixwireError {
    fn from(e: tokio::task::JoinError) -> Self {
        PixwireError::Worker(e.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for PixwireError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        PixwireError::ChannelClosed
    }
}
