//! Fuzz target for frame integrity
//!
//! # Strategy
//!
//! - Frame length: minimum, default, maximum, random in range
//! - Payloads: empty, full capacity, random lengths
//! - Mutation: none, bit flip, dropped frame, swapped frames, truncation
//!
//! # Invariants
//!
//! - Every encoded frame is exactly `max_frame_length` bytes
//! - Unmodified streams decode to the original payloads, in order
//! - Any mutation fails before a modified payload is returned

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use thicket_crypto::SecretKey;
use thicket_proto::{
    DEFAULT_FRAME_LENGTH, FrameConfig, FrameDecoder, FrameEncoder, MAX_FRAME_LENGTH,
    MIN_FRAME_LENGTH,
};

#[derive(Debug, Arbitrary)]
struct Scenario {
    key: [u8; 32],
    frame_length: FrameLength,
    payloads: Vec<Vec<u8>>,
    mutation: Mutation,
}

#[derive(Debug, Arbitrary)]
enum FrameLength {
    Min,
    Default,
    Max,
    Random(u16),
}

#[derive(Debug, Arbitrary)]
enum Mutation {
    None,
    FlipBit { frame: u8, offset: u16, bit: u8 },
    Drop(u8),
    Swap(u8, u8),
    Truncate(u16),
}

fuzz_target!(|scenario: Scenario| {
    let frame_length = match scenario.frame_length {
        FrameLength::Min => MIN_FRAME_LENGTH,
        FrameLength::Default => DEFAULT_FRAME_LENGTH,
        FrameLength::Max => MAX_FRAME_LENGTH,
        FrameLength::Random(n) => {
            MIN_FRAME_LENGTH + usize::from(n) % (MAX_FRAME_LENGTH - MIN_FRAME_LENGTH + 1)
        },
    };
    let config = FrameConfig::new(frame_length).unwrap();
    let key = SecretKey::new(scenario.key);

    let mut encoder = FrameEncoder::new(&key, config).unwrap();
    let capacity = encoder.payload_capacity();
    let payloads: Vec<&[u8]> = scenario
        .payloads
        .iter()
        .take(16)
        .map(|p| &p[..p.len().min(capacity)])
        .collect();
    if payloads.is_empty() {
        return;
    }

    let mut frames: Vec<Vec<u8>> = Vec::with_capacity(payloads.len());
    for (i, payload) in payloads.iter().enumerate() {
        let mut frame = Vec::new();
        encoder.encode_frame(payload, i + 1 == payloads.len(), &mut frame).unwrap();
        assert_eq!(frame.len(), frame_length);
        frames.push(frame);
    }

    let count = frames.len();
    let mutated = match scenario.mutation {
        Mutation::None => false,
        Mutation::FlipBit { frame, offset, bit } => {
            let frame = &mut frames[usize::from(frame) % count];
            let offset = usize::from(offset) % frame.len();
            frame[offset] ^= 1 << (bit % 8);
            true
        },
        Mutation::Drop(index) => {
            frames.remove(usize::from(index) % count);
            true
        },
        Mutation::Swap(a, b) => {
            let (a, b) = (usize::from(a) % count, usize::from(b) % count);
            frames.swap(a, b);
            a != b
        },
        Mutation::Truncate(length) => {
            let last = frames.last_mut().unwrap();
            last.truncate(usize::from(length) % frame_length);
            true
        },
    };

    let mut decoder = FrameDecoder::new(&key, config).unwrap();
    let mut decoded = Vec::new();
    let mut error = false;
    for frame in &frames {
        match decoder.decode_frame(frame) {
            Ok(frame) => decoded.push(frame),
            Err(_) => {
                error = true;
                break;
            },
        }
    }

    for (frame, original) in decoded.iter().zip(&payloads) {
        assert_eq!(&frame.payload[..], *original, "modified payload accepted");
    }
    if mutated {
        let complete = decoded.last().is_some_and(|frame| frame.is_final)
            && decoded.len() == payloads.len();
        assert!(error || !complete, "mutated stream decoded cleanly");
    } else {
        assert!(!error);
        assert_eq!(decoded.len(), payloads.len());
        assert!(decoded.last().unwrap().is_final);
    }
});
