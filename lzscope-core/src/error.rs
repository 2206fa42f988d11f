//! Error types for lzscope operations.
//!
//! A single error enum covers parameter validation, window addressing,
//! stream lifecycle misuse and the decoding/container failures met when
//! reading compressed data back.

use std::io;
use thiserror::Error;

/// The main error type for lzscope operations.
#[derive(Debug, Error)]
pub enum LzScopeError {
    /// I/O error from underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A compression parameter is outside its allowed range.
    #[error("Invalid parameters: {parameter}: {message}")]
    InvalidParameters {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// Human-readable description of the violation.
        message: String,
    },

    /// A back-reference points outside the retained window.
    #[error("Distance {distance} is outside the retained window of {available} bytes")]
    OutOfRange {
        /// Requested distance (1 = most recent byte).
        distance: usize,
        /// Number of bytes currently held.
        available: usize,
    },

    /// The session was used after it was finished.
    #[error("Stream misuse: {message}")]
    StreamMisuse {
        /// Description of the misuse.
        message: String,
    },

    /// Invalid magic number in a container header.
    #[error("Invalid magic number: expected {expected:02x?}, found {found:02x?}")]
    InvalidMagic {
        /// Expected magic bytes.
        expected: Vec<u8>,
        /// Actual magic bytes found.
        found: Vec<u8>,
    },

    /// Checksum mismatch.
    #[error("Checksum mismatch: expected {expected:#x}, computed {computed:#x}")]
    ChecksumMismatch {
        /// Checksum stored in the stream.
        expected: u64,
        /// Checksum computed from data.
        computed: u64,
    },

    /// Corrupted compressed data.
    #[error("Corrupted data at offset {offset}: {message}")]
    CorruptedData {
        /// Byte offset where corruption was detected.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Invalid header format.
    #[error("Invalid header: {message}")]
    InvalidHeader {
        /// Description of the header error.
        message: String,
    },

    /// Unexpected end of input.
    #[error("Unexpected end of input: expected {expected} more bytes")]
    UnexpectedEof {
        /// Number of bytes that were expected but not available.
        expected: usize,
    },
}

/// Result type alias for lzscope operations.
pub type Result<T> = std::result::Result<T, LzScopeError>;

impl LzScopeError {
    /// Create an invalid parameters error.
    pub fn invalid_parameters(parameter: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameters {
            parameter,
            message: message.into(),
        }
    }

    /// Create an out-of-range window access error.
    pub fn out_of_range(distance: usize, available: usize) -> Self {
        Self::OutOfRange {
            distance,
            available,
        }
    }

    /// Create a stream misuse error.
    pub fn stream_misuse(message: impl Into<String>) -> Self {
        Self::StreamMisuse {
            message: message.into(),
        }
    }

    /// Create an invalid magic error.
    pub fn invalid_magic(expected: impl Into<Vec<u8>>, found: impl Into<Vec<u8>>) -> Self {
        Self::InvalidMagic {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a checksum mismatch error.
    pub fn checksum_mismatch(expected: u64, computed: u64) -> Self {
        Self::ChecksumMismatch { expected, computed }
    }

    /// Create a corrupted data error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptedData {
            offset,
            message: message.into(),
        }
    }

    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create an unexpected EOF error.
    pub fn unexpected_eof(expected: usize) -> Self {
        Self::UnexpectedEof { expected }
    }

    /// Whether the error leaves the session unusable.
    ///
    /// Parameter errors are reported before a session exists and can be
    /// fixed by the caller; window and lifecycle violations cannot.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutOfRange { .. } | Self::StreamMisuse { .. })
    }
}
