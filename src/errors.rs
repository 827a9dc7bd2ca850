//! Error types for keycache

use crate::crypto::KeySide;
use thiserror::Error;

/// Main error type for keycache operations
#[derive(Error, Debug)]
pub enum KeyCacheError {
    // Codec errors
    #[error("No PEM block found in input")]
    NoArmorFound,

    #[error("Failed to encode {side} key: {reason}")]
    Encoding { side: KeySide, reason: String },

    #[error("Failed to decode {side} key: {reason}")]
    Decoding { side: KeySide, reason: String },

    #[error("Key type mismatch: expected {expected}, found {found}")]
    KeyTypeMismatch { expected: String, found: String },

    #[error("Unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),

    // Store errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Key pair mismatch: {0}")]
    KeyPairMismatch(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Internal errors
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl KeyCacheError {
    pub(crate) fn encoding(side: KeySide, reason: impl ToString) -> Self {
        KeyCacheError::Encoding {
            side,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn decoding(side: KeySide, reason: impl ToString) -> Self {
        KeyCacheError::Decoding {
            side,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, KeyCacheError>;
