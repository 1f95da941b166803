//! Error types for pgwire-frontend.
//!
//! All errors in this crate are represented by [`FrontendError`], which covers:
//! - Buffer errors (truncated fixed-width reads, impossible frame lengths)
//! - Text errors (C-strings that are not UTF-8)
//! - Stream errors (oversized frames, I/O failures, phase misuse)
//!
//! An unrecognized message type is deliberately *not* an error: it surfaces as
//! [`FrontendMessage::Unrecognized`](crate::protocol::FrontendMessage::Unrecognized).

use thiserror::Error;

/// Error type for all pgwire-frontend operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrontendError {
    /// Fewer bytes remain than a fixed-width read requires.
    #[error("truncated stream: needed {needed} bytes, {remaining} remaining")]
    TruncatedStream { needed: usize, remaining: usize },

    /// Declared frame length is smaller than the length field itself.
    #[error("invalid frame length: {0} (minimum is 4)")]
    InvalidFrameLength(i32),

    /// A C-string field was not valid UTF-8.
    #[error("invalid utf-8 in string field: {0}")]
    InvalidUtf8(String),

    /// Declared frame length exceeds the configured maximum.
    #[error("message too large: {len} bytes (max {max})")]
    MessageTooLarge { len: usize, max: usize },

    /// Protocol misuse, e.g. reading tagged messages before startup completed.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// I/O error from the underlying byte source.
    ///
    /// Note: `std::io::Error` is not `Clone`, so we store the message.
    #[error("io error: {0}")]
    Io(String),
}

impl FrontendError {
    /// Returns `true` if a fixed-width read ran past the end of the buffer.
    #[inline]
    pub fn is_truncation(&self) -> bool {
        matches!(self, FrontendError::TruncatedStream { .. })
    }

    /// Returns `true` if this is an I/O error.
    #[inline]
    pub fn is_io(&self) -> bool {
        matches!(self, FrontendError::Io(_))
    }

    /// Returns `true` if the frame header itself was unusable.
    #[inline]
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            FrontendError::InvalidFrameLength(_) | FrontendError::MessageTooLarge { .. }
        )
    }
}

// Manual From impl since io::Error isn't Clone
impl From<std::io::Error> for FrontendError {
    fn from(err: std::io::Error) -> Self {
        FrontendError::Io(err.to_string())
    }
}

/// Result type alias for pgwire-frontend operations.
pub type Result<T> = std::result::Result<T, FrontendError>;
