//! Tokens and folder ids assigned by a relay mailbox.
//!
//! Both are 32 random bytes written as 64 lowercase hex characters. Tokens
//! are credentials and never appear in `Debug` output.

use std::{fmt, hash::Hash, marker::PhantomData};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thicket_core::Environment;
use thiserror::Error;

/// Raw length of a mailbox id
pub const MAILBOX_ID_LENGTH: usize = 32;

/// Length of a mailbox id in hex
pub const MAILBOX_ID_HEX_LENGTH: usize = 2 * MAILBOX_ID_LENGTH;

/// Kind of mailbox id, fixing its name and whether it is secret.
pub trait IdKind {
    /// Type name used in `Debug` output
    const NAME: &'static str;
    /// Whether `Debug` output hides the value
    const SECRET: bool;
}

/// Marker for auth tokens (setup, owner, and contact tokens).
#[derive(Debug)]
pub enum Token {}

/// Marker for inbox and outbox folder ids.
#[derive(Debug)]
pub enum Folder {}

impl IdKind for Token {
    const NAME: &'static str = "MailboxAuthToken";
    const SECRET: bool = true;
}

impl IdKind for Folder {
    const NAME: &'static str = "MailboxFolderId";
    const SECRET: bool = false;
}

/// Credential presented to a relay mailbox.
pub type MailboxAuthToken = MailboxId<Token>;

/// Identifier of a folder (inbox or outbox) on a relay mailbox.
pub type MailboxFolderId = MailboxId<Folder>;

/// A string that is not 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("mailbox id must be {MAILBOX_ID_HEX_LENGTH} lowercase hex characters, got {length} characters")]
pub struct InvalidMailboxId {
    /// Length of the rejected string
    pub length: usize,
}

/// 32-byte identifier assigned by a relay mailbox.
pub struct MailboxId<K> {
    bytes: [u8; MAILBOX_ID_LENGTH],
    kind: PhantomData<fn() -> K>,
}

impl<K: IdKind> MailboxId<K> {
    /// Wrap raw bytes.
    pub const fn from_bytes(bytes: [u8; MAILBOX_ID_LENGTH]) -> Self {
        Self { bytes, kind: PhantomData }
    }

    /// Fresh random id.
    pub fn random(env: &impl Environment) -> Self {
        let mut bytes = [0u8; MAILBOX_ID_LENGTH];
        env.random_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    /// Parse the wire form. Uppercase hex is rejected so every id has
    /// exactly one encoding.
    pub fn parse(hex: &str) -> Result<Self, InvalidMailboxId> {
        let invalid = InvalidMailboxId { length: hex.len() };
        if hex.len() != MAILBOX_ID_HEX_LENGTH
            || !hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(invalid);
        }
        let mut bytes = [0u8; MAILBOX_ID_LENGTH];
        hex::decode_to_slice(hex, &mut bytes).map_err(|_| invalid)?;
        Ok(Self::from_bytes(bytes))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; MAILBOX_ID_LENGTH] {
        &self.bytes
    }

    /// Wire form: 64 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl<K> Clone for MailboxId<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for MailboxId<K> {}

impl<K> PartialEq for MailboxId<K> {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl<K> Eq for MailboxId<K> {}

impl<K> Hash for MailboxId<K> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl<K: IdKind> fmt::Debug for MailboxId<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if K::SECRET {
            write!(f, "{}([REDACTED])", K::NAME)
        } else {
            write!(f, "{}({})", K::NAME, self.to_hex())
        }
    }
}

impl<K: IdKind> Serialize for MailboxId<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de, K: IdKind> Deserialize<'de> for MailboxId<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::parse(&hex).map_err(de::Error::custom)
    }
}
