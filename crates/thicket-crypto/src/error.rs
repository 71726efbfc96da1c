//! Error types for transport key operations

use thiserror::Error;

/// Errors from key construction and validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Key material had the wrong length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length
        expected: usize,
        /// Actual key length
        actual: usize,
    },

    /// Transport identifier was empty or too long
    #[error("invalid transport id length: {length} (must be 1..={max})")]
    InvalidTransportId {
        /// Length of the rejected identifier in bytes
        length: usize,
        /// Maximum permitted length
        max: usize,
    },

    /// Rotation period length of zero
    #[error("rotation period length must be non-zero")]
    ZeroPeriodLength,
}

impl CryptoError {
    /// Returns true if this error is fatal (unrecoverable)
    ///
    /// Every variant here is a caller bug: the input can never become valid by
    /// retrying.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::InvalidKeyLength { .. }
            | Self::InvalidTransportId { .. }
            | Self::ZeroPeriodLength => true,
        }
    }
}
