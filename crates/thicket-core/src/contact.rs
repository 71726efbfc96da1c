//! Local contact identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Locally assigned identifier of a contact.
///
/// Never sent over a transport in the clear; only meaningful on this device.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ContactId(u32);

impl ContactId {
    /// Wrap a raw contact id.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw contact id.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ContactId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}
