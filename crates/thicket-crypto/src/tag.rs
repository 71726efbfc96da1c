//! Stream recognition tags
//!
//! Every stream starts with a tag computed from the sender's outgoing tag key
//! and a stream number. To anyone without the tag key the tag is
//! indistinguishable from random bytes. The recipient recognises a stream by
//! trial: it recomputes tags for each tag key it holds over a small window of
//! expected stream numbers until one matches.
//!
//! # Security Properties
//!
//! - Unlinkability: tags from the same sender are unrelated without the key
//! - Bounded cost: recognition work is `candidates × REORDERING_WINDOW_SIZE`
//! - Replay resistance: stream numbers never repeat under one tag key

use std::ops::Range;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::secret::SecretKey;

type HmacSha256 = Hmac<Sha256>;

/// Length of a stream tag in bytes
pub const TAG_LENGTH: usize = 16;

/// Stream protocol version bound into every tag
pub const PROTOCOL_VERSION: u16 = 1;

/// Number of stream numbers ahead of the lowest unseen one that a recipient
/// accepts
pub const REORDERING_WINDOW_SIZE: u64 = 32;

/// Label for tag derivation
const TAG_LABEL: &[u8] = b"thicket/tag/v1";

/// Pseudo-random stream prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag([u8; TAG_LENGTH]);

impl Tag {
    /// Wrap tag bytes read off the wire.
    pub const fn from_bytes(bytes: [u8; TAG_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Tag bytes as written to the wire.
    pub const fn as_bytes(&self) -> &[u8; TAG_LENGTH] {
        &self.0
    }

    /// Constant-time comparison.
    pub fn ct_matches(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

/// One tag key to try during recognition, with the stream numbers it may
/// currently use.
#[derive(Debug, Clone)]
pub struct TagCandidate<'a> {
    /// Incoming tag key
    pub tag_key: &'a SecretKey,
    /// Expected stream numbers (usually `base..base + REORDERING_WINDOW_SIZE`)
    pub stream_numbers: Range<u64>,
}

impl<'a> TagCandidate<'a> {
    /// Candidate accepting the reordering window starting at `base`.
    pub fn with_window(tag_key: &'a SecretKey, base: u64) -> Self {
        Self { tag_key, stream_numbers: base..base.saturating_add(REORDERING_WINDOW_SIZE) }
    }
}

/// A successful recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagMatch {
    /// Index into the candidate list that matched
    pub candidate: usize,
    /// Stream number the tag encodes
    pub stream_number: u64,
}

/// Encode the tag for `stream_number` under `tag_key`.
pub fn encode_tag(tag_key: &SecretKey, stream_number: u64) -> Tag {
    let Ok(mut mac) = HmacSha256::new_from_slice(tag_key.as_bytes()) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(TAG_LABEL);
    mac.update(&PROTOCOL_VERSION.to_be_bytes());
    mac.update(&stream_number.to_be_bytes());
    let result = mac.finalize().into_bytes();

    let mut tag = [0u8; TAG_LENGTH];
    tag.copy_from_slice(&result[..TAG_LENGTH]);
    Tag(tag)
}

/// Recognise `tag` by trial against every candidate.
///
/// Returns the first candidate and stream number whose encoding matches, or
/// `None` if the tag belongs to no known key.
pub fn try_decode(tag: &Tag, candidates: &[TagCandidate<'_>]) -> Option<TagMatch> {
    candidates.iter().enumerate().find_map(|(candidate, c)| {
        c.stream_numbers
            .clone()
            .find(|&n| encode_tag(c.tag_key, n).ct_matches(tag))
            .map(|stream_number| TagMatch { candidate, stream_number })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> SecretKey {
        SecretKey::new([byte; 32])
    }

    #[test]
    fn encode_is_deterministic() {
        assert_eq!(encode_tag(&key(1), 5), encode_tag(&key(1), 5));
    }

    #[test]
    fn different_streams_produce_different_tags() {
        let k = key(1);
        assert_ne!(encode_tag(&k, 0), encode_tag(&k, 1));
    }

    #[test]
    fn different_keys_produce_different_tags() {
        assert_ne!(encode_tag(&key(1), 0), encode_tag(&key(2), 0));
    }

    #[test]
    fn decode_finds_stream_number() {
        let k = key(3);
        let tag = encode_tag(&k, 17);

        let found = try_decode(&tag, &[TagCandidate::with_window(&k, 0)]);
        assert_eq!(found, Some(TagMatch { candidate: 0, stream_number: 17 }));
    }

    #[test]
    fn decode_reports_matching_candidate() {
        let a = key(1);
        let b = key(2);
        let c = key(3);
        let tag = encode_tag(&c, 4);

        let candidates = [
            TagCandidate::with_window(&a, 0),
            TagCandidate::with_window(&b, 0),
            TagCandidate::with_window(&c, 0),
        ];
        assert_eq!(
            try_decode(&tag, &candidates),
            Some(TagMatch { candidate: 2, stream_number: 4 })
        );
    }

    #[test]
    fn decode_outside_window_fails() {
        let k = key(4);
        let tag = encode_tag(&k, REORDERING_WINDOW_SIZE);

        assert_eq!(try_decode(&tag, &[TagCandidate::with_window(&k, 0)]), None);
        assert!(try_decode(&tag, &[TagCandidate::with_window(&k, 1)]).is_some());
    }

    #[test]
    fn decode_with_unknown_key_fails() {
        let tag = encode_tag(&key(5), 0);
        assert_eq!(try_decode(&tag, &[TagCandidate::with_window(&key(6), 0)]), None);
        assert_eq!(try_decode(&tag, &[]), None);
    }

    #[test]
    fn window_saturates_at_max() {
        let k = key(7);
        let candidate = TagCandidate::with_window(&k, u64::MAX - 1);
        assert_eq!(candidate.stream_numbers, (u64::MAX - 1)..u64::MAX);
    }
}
