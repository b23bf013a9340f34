//! Domain-specific error types for farview.
//!
//! All fallible operations return `Result<T, FarviewError>`.
//! Channel I/O failures are typed and recoverable — the bridge layers
//! log them and disable the affected direction instead of panicking.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the farview client.
#[derive(Debug, Error)]
pub enum FarviewError {
    // ── Wire / record errors ─────────────────────────────────────
    /// A fixed-size record arrived with the wrong byte length.
    #[error("invalid record length: expected {expected}, got {actual}")]
    InvalidRecordLength { expected: usize, actual: usize },

    /// A field in a message header could not be parsed.
    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),

    /// A frame message exceeds the configured maximum payload.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    // ── Video errors ─────────────────────────────────────────────
    /// A decoded frame failed validation (bad dimensions, short plane).
    #[error("invalid frame: {0}")]
    InvalidFrame(&'static str),

    /// The render context could not be made current.
    #[error("render context activation failed: {0}")]
    ContextActivation(String),

    /// The render slot rejected a write.
    #[error("render slot write failed: {0}")]
    SlotWrite(String),

    // ── Connection errors ────────────────────────────────────────
    /// The TCP/UDP layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An endpoint address string could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // ── Session errors ───────────────────────────────────────────
    /// The session handshake did not complete as expected.
    #[error("handshake failed: {0}")]
    Handshake(&'static str),

    /// The peer violated the session message protocol.
    #[error("protocol violation: {0}")]
    Protocol(&'static str),

    // ── Serialization errors ─────────────────────────────────────
    /// Encoding or decoding of a payload failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for FarviewError {
    fn from(s: String) -> Self {
        FarviewError::Other(s)
    }
}

impl From<&str> for FarviewError {
    fn from(s: &str) -> Self {
        FarviewError::Other(s.to_string())
    }
}

impl From<std::net::AddrParseError> for FarviewError {
    fn from(e: std::net::AddrParseError) -> Self {
        FarviewError::InvalidAddress(e.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for FarviewError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        FarviewError::ChannelClosed
    }
}

impl From<Box<bincode::ErrorKind>> for FarviewError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        FarviewError::Encoding(e.to_string())
    }
}
