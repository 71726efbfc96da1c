//! Owned 32-byte key material
//!
//! # Security Properties
//!
//! - Zeroized on drop, so superseded keys do not linger in memory
//! - Never `Copy`: duplicating key material requires an explicit `clone()`
//! - Constant-time equality
//! - `Debug` never prints key bytes

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::CryptoError;

/// Length of every secret key in bytes.
pub const SECRET_KEY_LENGTH: usize = 32;

/// A 32-byte symmetric key.
///
/// Used for root secrets, derivation bases, tag keys and frame keys.
#[derive(Clone)]
pub struct SecretKey {
    bytes: [u8; SECRET_KEY_LENGTH],
}

impl SecretKey {
    /// Wrap raw key bytes.
    pub fn new(bytes: [u8; SECRET_KEY_LENGTH]) -> Self {
        Self { bytes }
    }

    /// Copy key material from a slice.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyLength` if the slice is not exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; SECRET_KEY_LENGTH] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKeyLength { expected: SECRET_KEY_LENGTH, actual: bytes.len() }
        })?;
        Ok(Self { bytes })
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SECRET_KEY_LENGTH] {
        &self.bytes
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for SecretKey {}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

// Implement Drop to zeroize key material
impl Drop for SecretKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}
