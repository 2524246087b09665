//! # Error Types
//!
//! Errors raised while parsing the shared scalar types.

use thiserror::Error;

/// Errors that can occur when parsing a field element from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeltParseError {
    /// The input was empty (or only a `0x` prefix).
    #[error("Empty field element")]
    Empty,

    /// More than 64 hex digits were supplied.
    #[error("Field element too long: {digits} hex digits (max 64)")]
    TooLong { digits: usize },

    /// A non-hex character was found.
    #[error("Invalid hex in field element: {0}")]
    InvalidHex(String),
}
