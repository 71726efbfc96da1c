//! Property-based tests for the transport key manager
//!
//! Two managers sharing a root secret play sender and receiver:
//!
//! 1. **Exactly once**: every stream in the reordering window is recognised
//!    once, in any arrival order, and refused on replay
//! 2. **Clock skew**: streams sent one period ahead or behind are recognised
//! 3. **Isolation**: a contact's streams are never attributed to another

use proptest::prelude::*;
use thicket_core::{ContactId, KeyEvent, Transaction, TransportKeyManager};
use thicket_crypto::{
    REORDERING_WINDOW_SIZE, Role, RotationPeriod, SecretKey, Tag, TransportId, encode_tag,
};

const SENDER: ContactId = ContactId::new(10);
const RECEIVER: ContactId = ContactId::new(20);

fn manager(contacts: &[(ContactId, [u8; 32])], period: u64, role: Role) -> TransportKeyManager {
    let mut manager = TransportKeyManager::new(TransportId::new("tor").unwrap());
    let mut txn: Transaction<(), KeyEvent> = Transaction::new((), false);
    for (contact, secret) in contacts {
        manager
            .add_contact(&mut txn, *contact, &SecretKey::new(*secret), RotationPeriod::new(period), role)
            .unwrap();
    }
    manager
}

fn send(manager: &mut TransportKeyManager, count: usize) -> Vec<Tag> {
    (0..count)
        .map(|_| {
            let ctx = manager.next_outgoing_stream(RECEIVER).unwrap();
            encode_tag(ctx.outgoing().tag_key(), ctx.stream_number())
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_each_stream_recognised_once(
        secret in any::<[u8; 32]>(),
        order in Just((0..REORDERING_WINDOW_SIZE as usize).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let mut sender = manager(&[(RECEIVER, secret)], 50, Role::Initiator);
        let mut receiver = manager(&[(SENDER, secret)], 50, Role::Responder);
        let tags = send(&mut sender, order.len());

        for &i in &order {
            let incoming = receiver.recognise(&tags[i]);
            prop_assert!(incoming.is_some(), "stream {} not recognised", i);
            let incoming = incoming.unwrap();
            prop_assert_eq!(incoming.contact(), SENDER);
            prop_assert_eq!(incoming.stream_number(), i as u64);
        }

        for tag in &tags {
            prop_assert!(receiver.recognise(tag).is_none());
        }
    }

    #[test]
    fn prop_clock_skew_tolerated(
        secret in any::<[u8; 32]>(),
        period in 1u64..1_000_000,
        sender_ahead in any::<bool>(),
    ) {
        let (sender_period, receiver_period) =
            if sender_ahead { (period + 1, period) } else { (period, period + 1) };

        let mut sender = manager(&[(RECEIVER, secret)], sender_period, Role::Responder);
        let mut receiver = manager(&[(SENDER, secret)], receiver_period, Role::Initiator);

        let tags = send(&mut sender, 1);
        let incoming = receiver.recognise(&tags[0]);
        prop_assert!(incoming.is_some());
        prop_assert_eq!(incoming.unwrap().incoming().period(), RotationPeriod::new(sender_period));
    }

    #[test]
    fn prop_streams_attributed_to_sender(
        ours in any::<[u8; 32]>(),
        other in any::<[u8; 32]>(),
    ) {
        prop_assume!(ours != other);
        let other_contact = ContactId::new(30);

        let mut sender = manager(&[(RECEIVER, ours)], 9, Role::Initiator);
        let mut receiver =
            manager(&[(other_contact, other), (SENDER, ours)], 9, Role::Responder);

        let tags = send(&mut sender, 4);
        for tag in &tags {
            prop_assert_eq!(receiver.recognise(tag).map(|s| s.contact()), Some(SENDER));
        }
    }
}

#[test]
fn rotation_keeps_late_streams_recognisable() {
    let secret = [0x77; 32];
    let mut sender = manager(&[(RECEIVER, secret)], 100, Role::Initiator);
    let mut receiver = manager(&[(SENDER, secret)], 100, Role::Responder);

    let tags = send(&mut sender, 3);
    assert!(receiver.recognise(&tags[0]).is_some());

    // Receiver moves on before the late streams arrive
    let mut txn: Transaction<(), KeyEvent> = Transaction::new((), false);
    assert!(receiver.rotate_to(&mut txn, RotationPeriod::new(101)).unwrap());

    assert!(receiver.recognise(&tags[2]).is_some());
    assert!(receiver.recognise(&tags[1]).is_some());
    assert!(receiver.recognise(&tags[0]).is_none());
}

#[test]
fn jump_rotation_drops_old_windows() {
    let secret = [0x78; 32];
    let mut sender = manager(&[(RECEIVER, secret)], 100, Role::Initiator);
    let mut receiver = manager(&[(SENDER, secret)], 100, Role::Responder);

    let tags = send(&mut sender, 1);

    let mut txn: Transaction<(), KeyEvent> = Transaction::new((), false);
    receiver.rotate_to(&mut txn, RotationPeriod::new(105)).unwrap();
    assert!(receiver.recognise(&tags[0]).is_none());

    sender.rotate_to(&mut txn, RotationPeriod::new(105)).unwrap();
    let tags = send(&mut sender, 1);
    assert!(receiver.recognise(&tags[0]).is_some());
}
