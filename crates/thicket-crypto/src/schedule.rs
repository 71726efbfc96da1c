//! Transport key schedule using HKDF
//!
//! ```text
//! Root Secret
//!     │
//!     ▼ HKDF(transport_id, sender role)
//! Base[initiator], Base[responder]
//!     │
//!     ▼ HKDF-Expand("tag" | "frame", period)
//! DirectionalKeys[period]
//!     │
//!     ▼ HKDF-Expand(stream_number)
//! Stream Frame Key
//! ```
//!
//! Keys are indexed by the role that *sends* with them, so the initiator's
//! outgoing keys are the responder's incoming keys for the same period.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::{
    keys::{DirectionalKeys, Role, RotationPeriod, TransportId, TransportKeys},
    secret::{SECRET_KEY_LENGTH, SecretKey},
};

/// Label used for per-transport base derivation
const BASE_LABEL: &[u8] = b"thicket/transport/base/v1";

/// Label for tag keys
const TAG_LABEL: &[u8] = b"thicket/tag-key/v1";

/// Label for frame keys
const FRAME_LABEL: &[u8] = b"thicket/frame-key/v1";

/// Label for per-stream frame keys
const STREAM_LABEL: &[u8] = b"thicket/stream/v1";

/// Derive the full key bundle for one contact over one transport.
///
/// # Security
///
/// - Deterministic: same inputs always produce the same bundle
/// - Symmetric: `derive(.., Initiator).current_outgoing()` equals
///   `derive(.., Responder).current_incoming()` and vice versa
/// - Different root secrets, transports or roles produce unrelated keys
pub fn derive_transport_keys(
    transport_id: &TransportId,
    root_secret: &SecretKey,
    period: RotationPeriod,
    role: Role,
) -> TransportKeys {
    let outgoing_base = derive_base(root_secret, transport_id, role);
    let incoming_base = derive_base(root_secret, transport_id, role.peer());
    keys_from_bases(transport_id.clone(), incoming_base, outgoing_base, period)
}

/// Derive the frame key for a single stream.
///
/// Frame numbers restart at zero in every stream, so each stream encrypts
/// under its own key rather than the window's frame key.
pub fn derive_stream_key(frame_key: &SecretKey, stream_number: u64) -> SecretKey {
    expand(frame_key, STREAM_LABEL, stream_number)
}

/// Build a bundle for `period` from existing bases.
pub(crate) fn keys_from_bases(
    transport_id: TransportId,
    incoming_base: SecretKey,
    outgoing_base: SecretKey,
    period: RotationPeriod,
) -> TransportKeys {
    TransportKeys {
        transport_id,
        period,
        previous_incoming: derive_window(&incoming_base, period.previous()),
        current_incoming: derive_window(&incoming_base, period),
        next_incoming: derive_window(&incoming_base, period.next()),
        current_outgoing: derive_window(&outgoing_base, period),
        incoming_base,
        outgoing_base,
    }
}

/// Derive the tag and frame keys of one window.
pub(crate) fn derive_window(base: &SecretKey, period: RotationPeriod) -> DirectionalKeys {
    DirectionalKeys {
        tag_key: expand(base, TAG_LABEL, period.get()),
        frame_key: expand(base, FRAME_LABEL, period.get()),
        period,
    }
}

fn derive_base(root_secret: &SecretKey, transport_id: &TransportId, sender: Role) -> SecretKey {
    let hkdf = Hkdf::<Sha256>::new(None, root_secret.as_bytes());

    // Build the info parameter: label || id_len || id || sender
    let id = transport_id.as_str().as_bytes();
    let sender = sender.label();
    let mut info = Vec::with_capacity(BASE_LABEL.len() + 1 + id.len() + sender.len());
    info.extend_from_slice(BASE_LABEL);
    // TransportId is at most 100 bytes, so the length fits in a byte
    info.push(id.len() as u8);
    info.extend_from_slice(id);
    info.extend_from_slice(sender);

    let mut okm = [0u8; SECRET_KEY_LENGTH];
    let Ok(()) = hkdf.expand(&info, &mut okm) else {
        unreachable!("invariant: 32 bytes is a valid HKDF-SHA256 output length");
    };

    let key = SecretKey::new(okm);
    okm.zeroize();
    key
}

fn expand(base: &SecretKey, label: &[u8], index: u64) -> SecretKey {
    let Ok(hkdf) = Hkdf::<Sha256>::from_prk(base.as_bytes()) else {
        unreachable!("invariant: 32-byte PRK meets the HKDF-SHA256 minimum length");
    };

    let mut info = Vec::with_capacity(label.len() + 8);
    info.extend_from_slice(label);
    info.extend_from_slice(&index.to_be_bytes());

    let mut okm = [0u8; SECRET_KEY_LENGTH];
    let Ok(()) = hkdf.expand(&info, &mut okm) else {
        unreachable!("invariant: 32 bytes is a valid HKDF-SHA256 output length");
    };

    let key = SecretKey::new(okm);
    okm.zeroize();
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> TransportId {
        TransportId::new("chat").unwrap()
    }

    fn root() -> SecretKey {
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = i as u8;
        }
        SecretKey::new(bytes)
    }

    #[test]
    fn derive_is_deterministic() {
        let a = derive_transport_keys(&transport(), &root(), RotationPeriod::new(7), Role::Initiator);
        let b = derive_transport_keys(&transport(), &root(), RotationPeriod::new(7), Role::Initiator);
        assert_eq!(a, b, "same inputs must produce same output");
    }

    #[test]
    fn windows_carry_their_periods() {
        let keys =
            derive_transport_keys(&transport(), &root(), RotationPeriod::new(123), Role::Responder);

        assert_eq!(keys.period(), RotationPeriod::new(123));
        assert_eq!(keys.previous_incoming().period(), RotationPeriod::new(122));
        assert_eq!(keys.current_incoming().period(), RotationPeriod::new(123));
        assert_eq!(keys.next_incoming().period(), RotationPeriod::new(124));
        assert_eq!(keys.current_outgoing().period(), RotationPeriod::new(123));
    }

    #[test]
    fn roles_are_symmetric() {
        let period = RotationPeriod::new(123);
        let initiator = derive_transport_keys(&transport(), &root(), period, Role::Initiator);
        let responder = derive_transport_keys(&transport(), &root(), period, Role::Responder);

        assert_eq!(initiator.current_outgoing(), responder.current_incoming());
        assert_eq!(responder.current_outgoing(), initiator.current_incoming());
    }

    #[test]
    fn tag_and_frame_keys_differ() {
        let keys =
            derive_transport_keys(&transport(), &root(), RotationPeriod::new(1), Role::Initiator);
        let out = keys.current_outgoing();
        assert_ne!(out.tag_key(), out.frame_key());
    }

    #[test]
    fn stream_keys_differ_per_stream() {
        let frame_key = SecretKey::new([9; 32]);
        let s0 = derive_stream_key(&frame_key, 0);
        let s1 = derive_stream_key(&frame_key, 1);

        assert_ne!(s0, s1);
        assert_ne!(&s0, &frame_key);
        assert_eq!(s0, derive_stream_key(&frame_key, 0));
    }

    #[test]
    fn period_boundary_values() {
        // Period 0 has a wrapped previous window; it must still be distinct
        let keys =
            derive_transport_keys(&transport(), &root(), RotationPeriod::new(0), Role::Initiator);
        assert_ne!(keys.previous_incoming(), keys.current_incoming());

        let keys = derive_transport_keys(
            &transport(),
            &root(),
            RotationPeriod::new(u64::MAX),
            Role::Initiator,
        );
        assert_ne!(keys.next_incoming(), keys.current_incoming());
    }

    #[test]
    fn longest_transport_id_derives() {
        let longest = TransportId::new("x".repeat(crate::keys::MAX_TRANSPORT_ID_LENGTH)).unwrap();
        let short = TransportId::new("x").unwrap();
        let period = RotationPeriod::new(5);

        let a = derive_transport_keys(&longest, &root(), period, Role::Initiator);
        let b = derive_transport_keys(&short, &root(), period, Role::Initiator);
        assert_ne!(a.current_outgoing(), b.current_outgoing());
        assert_eq!(a, derive_transport_keys(&longest, &root(), period, Role::Initiator));
    }
}
