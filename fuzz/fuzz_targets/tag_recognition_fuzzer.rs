//! Fuzz target for stream tag recognition
//!
//! # Invariants
//!
//! - A tag encoded inside a candidate's window is recognised with its
//!   stream number
//! - A tag encoded outside every window is never recognised
//! - Arbitrary tag bytes never match (with overwhelming probability) and
//!   never panic

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use thicket_crypto::{
    REORDERING_WINDOW_SIZE, SecretKey, Tag, TagCandidate, encode_tag, try_decode,
};

#[derive(Debug, Arbitrary)]
struct Scenario {
    keys: Vec<([u8; 32], u64)>,
    target: u8,
    stream_number: u64,
    noise: [u8; 16],
}

fuzz_target!(|scenario: Scenario| {
    let keys: Vec<(SecretKey, u64)> = scenario
        .keys
        .iter()
        .take(4)
        .map(|(bytes, base)| (SecretKey::new(*bytes), *base))
        .collect();
    if keys.is_empty() {
        return;
    }
    let candidates: Vec<TagCandidate<'_>> =
        keys.iter().map(|(key, base)| TagCandidate::with_window(key, *base)).collect();

    let target = usize::from(scenario.target) % keys.len();
    let (key, base) = &keys[target];
    let tag = encode_tag(key, scenario.stream_number);
    let in_window = candidates[target].stream_numbers.contains(&scenario.stream_number);

    match try_decode(&tag, &candidates) {
        Some(found) => {
            assert_eq!(found.stream_number, scenario.stream_number);
            assert!(candidates[found.candidate].tag_key.as_bytes() == key.as_bytes());
            assert!(found.candidate <= target || !in_window);
        },
        None => {
            assert!(!in_window, "tag in window of key {target} (base {base}) not recognised");
        },
    }
    assert!(candidates.iter().all(|c| c.stream_numbers.end - c.stream_numbers.start
        <= REORDERING_WINDOW_SIZE));

    let _ = try_decode(&Tag::from_bytes(scenario.noise), &candidates);
});
