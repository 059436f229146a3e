//! Error types for storegate
//!
//! Provides a unified error type for all operations, plus the typed
//! failures of the message codec.

use thiserror::Error;

/// Result type alias using GateError
pub type Result<T> = std::result::Result<T, GateError>;

/// Unified error type for storegate operations
#[derive(Debug, Error)]
pub enum GateError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    // -------------------------------------------------------------------------
    // Exchange Errors
    // -------------------------------------------------------------------------
    #[error("No response for '{path}' within {waited_ms} ms")]
    NoResponse { path: String, waited_ms: u64 },

    #[error("Handler failure: {0}")]
    Handler(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Reasons a datagram is rejected by the decoder.
///
/// Every variant is recoverable: the offending datagram is dropped and
/// nothing else is affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("datagram truncated")]
    Truncated,

    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    #[error("invalid token length {0}")]
    InvalidTokenLength(u8),

    /// Reserved nibble value 15 outside the payload marker, or an option
    /// number that overflows.
    #[error("invalid option encoding")]
    InvalidOption,

    /// Payload marker with no payload bytes after it.
    #[error("payload marker followed by empty payload")]
    EmptyPayload,
}

/// Messages that cannot be represented on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("token of {0} bytes exceeds 8")]
    TokenTooLong(usize),

    #[error("option delta {0} out of range")]
    OptionDeltaTooLarge(u32),

    #[error("option value of {0} bytes out of range")]
    OptionValueTooLong(usize),
}
