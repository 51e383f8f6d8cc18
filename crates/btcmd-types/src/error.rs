//! Error types for value parsing in btcmd-types.

use thiserror::Error;

/// Errors that can occur when parsing protocol values from text.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in btcmd-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A hex payload had an odd number of digits.
    #[error("Invalid hex payload: odd number of digits ({0})")]
    OddHexLength(usize),

    /// A hex payload contained a non-hex character.
    #[error("Invalid hex payload: unexpected character '{character}' at offset {offset}")]
    InvalidHexDigit {
        /// The offending character.
        character: char,
        /// Offset of the character within the cleaned input.
        offset: usize,
    },

    /// Unrecognised radio state name.
    #[error("Unknown radio state: {0}")]
    UnknownRadioState(String),

    /// Failed to parse a UUID.
    #[error("Invalid UUID: {0}")]
    InvalidUuid(String),
}

/// Result type alias using btcmd-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
