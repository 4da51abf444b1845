//! Error types shared by the value/store layer.

use thiserror::Error;

/// Errors that can arise while manipulating a [`crate::Value`] or
/// [`crate::Store`].
///
/// Most `Value` operations are total (out-of-range array access yields
/// `Null`, missing object keys yield `Null`) — this enum only covers the
/// handful of operations that are genuinely partial.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValueError {
    #[error("array set index {index} out of range (length {length})")]
    ArrayIndexOutOfRange { index: i64, length: usize },

    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}
