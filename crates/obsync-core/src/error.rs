//! Error types for the wire codecs.

use thiserror::Error;

/// Low-level reason a byte stream or text document could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("negative record count: {0}")]
    NegativeCount(i32),

    #[error("record count {count} exceeds remaining input ({remaining} bytes)")]
    CountExceedsInput { count: usize, remaining: usize },

    #[error("unknown operation tag: {0}")]
    UnknownOperation(u8),

    #[error("invalid bool byte: {0}")]
    InvalidBool(u8),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("length prefix is not a valid 7-bit encoded int")]
    VarintOverflow,

    #[error("{0} trailing bytes after last record")]
    TrailingBytes(usize),

    #[error("invalid text snapshot: {0}")]
    InvalidText(String),
}

/// Errors surfaced to callers decoding deltas or snapshots.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("corrupt delta: {0}")]
    CorruptDelta(WireError),

    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(WireError),
}

impl CodecError {
    /// The wire-level cause.
    pub fn cause(&self) -> &WireError {
        match self {
            CodecError::CorruptDelta(e) | CodecError::CorruptSnapshot(e) => e,
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::CorruptSnapshot(WireError::InvalidText(err.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
