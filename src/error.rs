//! Error taxonomy shared by every rope operation

use thiserror::Error;

/// Errors produced by dimension codecs, leaf strings and tree operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RopeError {
    /// A dimension field does not fit its bit width
    #[error("dimension field `{field}` out of range: {value} > {max}")]
    OutOfRange {
        field: &'static str,
        value: usize,
        max: usize,
    },

    /// Combining two dimension vectors exceeds a field's capacity
    #[error("dimension field `{field}` would overflow when combined")]
    Overflow { field: &'static str },

    /// Input text is not valid UTF-8
    #[error("invalid UTF-8 after {valid_up_to} bytes")]
    InvalidEncoding { valid_up_to: usize },

    /// Index outside the valid range for the requested dimension
    #[error("index {index} out of bounds (len {len})")]
    OutOfBounds { index: usize, len: usize },

    /// Split or edit would cut a multi-byte character
    #[error("offset {offset} is not on a character boundary")]
    BoundaryError { offset: usize },

    /// Cursor handle was removed or belongs to another rope
    #[error("no cursor with id {id}")]
    UnknownCursor { id: u32 },

    /// Tree invariant violated; the tree was mutated outside the protocol
    #[error("corrupt tree: {0}")]
    CorruptTree(String),
}

pub type Result<T> = std::result::Result<T, RopeError>;

impl RopeError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::error!(reason = %msg, "rope consistency check failed");
        RopeError::CorruptTree(msg)
    }
}

impl From<simdutf8::compat::Utf8Error> for RopeError {
    fn from(err: simdutf8::compat::Utf8Error) -> Self {
        RopeError::InvalidEncoding {
            valid_up_to: err.valid_up_to(),
        }
    }
}
