//! Key bundle types shared by the schedule, rotation and tag codec

use std::{fmt, time::Duration};

use crate::{error::CryptoError, secret::SecretKey};

/// Maximum length of a transport identifier in bytes
pub const MAX_TRANSPORT_ID_LENGTH: usize = 100;

/// Default length of one rotation period (one day)
pub const DEFAULT_ROTATION_PERIOD_LENGTH: Duration = Duration::from_secs(24 * 60 * 60);

/// Identifier of a transport plugin family (e.g. `"lan"`, `"tor"`).
///
/// Unique per plugin family, not per contact. Part of the key derivation
/// input, so two transports never share keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransportId(String);

impl TransportId {
    /// Create a transport identifier.
    ///
    /// # Errors
    ///
    /// - `InvalidTransportId` if the identifier is empty or longer than
    ///   [`MAX_TRANSPORT_ID_LENGTH`] bytes
    pub fn new(id: impl Into<String>) -> Result<Self, CryptoError> {
        let id = id.into();
        if id.is_empty() || id.len() > MAX_TRANSPORT_ID_LENGTH {
            return Err(CryptoError::InvalidTransportId {
                length: id.len(),
                max: MAX_TRANSPORT_ID_LENGTH,
            });
        }
        Ok(Self(id))
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Index of a global fixed-length time window.
///
/// The sole driver of key rotation. All transports and contacts share the
/// same clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RotationPeriod(u64);

impl RotationPeriod {
    /// Wrap a raw period index.
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Raw period index.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Period containing the given Unix timestamp.
    ///
    /// # Errors
    ///
    /// - `ZeroPeriodLength` if `period_length` rounds down to zero seconds
    pub fn from_unix_secs(unix_secs: u64, period_length: Duration) -> Result<Self, CryptoError> {
        let length = period_length.as_secs();
        if length == 0 {
            return Err(CryptoError::ZeroPeriodLength);
        }
        Ok(Self(unix_secs / length))
    }

    /// The preceding period (wraps at zero).
    pub const fn previous(self) -> Self {
        Self(self.0.wrapping_sub(1))
    }

    /// The following period (wraps at `u64::MAX`).
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Number of periods from `self` forward to `later`. `None` if `later`
    /// is not after `self`.
    pub fn periods_until(self, later: Self) -> Option<u64> {
        later.0.checked_sub(self.0).filter(|&d| d > 0)
    }
}

impl fmt::Display for RotationPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of the root-secret agreement this party played.
///
/// Each role sends with its own derived key stream, so one party's outgoing
/// keys are the other party's incoming keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The party that initiated the agreement
    Initiator,
    /// The party that responded to the agreement
    Responder,
}

impl Role {
    /// The other party's role.
    pub const fn peer(self) -> Self {
        match self {
            Self::Initiator => Self::Responder,
            Self::Responder => Self::Initiator,
        }
    }

    pub(crate) const fn label(self) -> &'static [u8] {
        match self {
            Self::Initiator => b"initiator",
            Self::Responder => b"responder",
        }
    }
}

/// Tag and frame keys for one direction of one rotation window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionalKeys {
    pub(crate) tag_key: SecretKey,
    pub(crate) frame_key: SecretKey,
    pub(crate) period: RotationPeriod,
}

impl DirectionalKeys {
    /// Key used to encode and recognise stream tags.
    pub fn tag_key(&self) -> &SecretKey {
        &self.tag_key
    }

    /// Key from which per-stream frame keys are derived.
    pub fn frame_key(&self) -> &SecretKey {
        &self.frame_key
    }

    /// Rotation period these keys belong to.
    pub fn period(&self) -> RotationPeriod {
        self.period
    }
}

/// All keys one party holds for one contact over one transport.
///
/// Immutable: [`crate::rotate`] consumes a bundle and returns a new one.
///
/// # Invariants
///
/// - The four windows are pairwise distinct
/// - `previous_incoming`, `current_incoming` and `next_incoming` belong to
///   `period - 1`, `period` and `period + 1`; `current_outgoing` to `period`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportKeys {
    pub(crate) transport_id: TransportId,
    pub(crate) period: RotationPeriod,
    pub(crate) previous_incoming: DirectionalKeys,
    pub(crate) current_incoming: DirectionalKeys,
    pub(crate) next_incoming: DirectionalKeys,
    pub(crate) current_outgoing: DirectionalKeys,
    /// Derivation base for keys the peer sends with
    pub(crate) incoming_base: SecretKey,
    /// Derivation base for keys we send with
    pub(crate) outgoing_base: SecretKey,
}

impl TransportKeys {
    /// Transport these keys are bound to.
    pub fn transport_id(&self) -> &TransportId {
        &self.transport_id
    }

    /// Rotation period of the current windows.
    pub fn period(&self) -> RotationPeriod {
        self.period
    }

    /// Incoming keys for `period - 1`.
    pub fn previous_incoming(&self) -> &DirectionalKeys {
        &self.previous_incoming
    }

    /// Incoming keys for `period`.
    pub fn current_incoming(&self) -> &DirectionalKeys {
        &self.current_incoming
    }

    /// Incoming keys for `period + 1`.
    pub fn next_incoming(&self) -> &DirectionalKeys {
        &self.next_incoming
    }

    /// Outgoing keys for `period`.
    pub fn current_outgoing(&self) -> &DirectionalKeys {
        &self.current_outgoing
    }

    /// The three incoming windows, oldest first.
    pub fn incoming_windows(&self) -> [&DirectionalKeys; 3] {
        [&self.previous_incoming, &self.current_incoming, &self.next_incoming]
    }
}
