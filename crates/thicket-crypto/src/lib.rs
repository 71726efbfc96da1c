//! Thicket Transport Cryptography
//!
//! Key schedule, rotation and stream tags for per-contact, per-transport
//! symmetric keys. Pure functions with deterministic outputs and no I/O.
//!
//! # Key Lifecycle
//!
//! Two contacts who share a root secret derive, for every transport and
//! every rotation period, matching keys without talking to each other again.
//! Each party holds three incoming windows (previous, current, next period)
//! to tolerate clock skew, and one outgoing window.
//!
//! ```text
//! Root Secret ──► derive_transport_keys ──► TransportKeys[period]
//!                                                │
//!                         rotate(period + n) ◄───┘
//!                                                │
//!                        DirectionalKeys ────────┤
//!                          │         │
//!                          ▼         ▼
//!                    encode_tag   derive_stream_key
//!                    (Tag)        (frame encryption, see thicket-proto)
//! ```
//!
//! # Security
//!
//! Symmetry:
//! - The initiator's outgoing keys equal the responder's incoming keys for
//!   the same transport and period, and vice versa
//!
//! Isolation:
//! - Root secret, transport id and role all feed every derived key
//! - Windows within one bundle are pairwise distinct
//!
//! Hygiene:
//! - All key material lives in [`SecretKey`], zeroized on drop
//! - Superseded windows are dropped (and zeroized) by [`rotate`]

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod keys;
pub mod rotation;
pub mod schedule;
pub mod secret;
pub mod tag;

pub use error::CryptoError;
pub use keys::{
    DEFAULT_ROTATION_PERIOD_LENGTH, DirectionalKeys, MAX_TRANSPORT_ID_LENGTH, Role,
    RotationPeriod, TransportId, TransportKeys,
};
pub use rotation::rotate;
pub use schedule::{derive_stream_key, derive_transport_keys};
pub use secret::{SECRET_KEY_LENGTH, SecretKey};
pub use tag::{
    PROTOCOL_VERSION, REORDERING_WINDOW_SIZE, TAG_LENGTH, Tag, TagCandidate, TagMatch,
    encode_tag, try_decode,
};
