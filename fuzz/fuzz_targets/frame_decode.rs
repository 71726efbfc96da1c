//! Fuzz target for FrameDecoder::decode_frame
//!
//! Feeds arbitrary bytes to a decoder as a sequence of frames to find:
//! - Panics on short, long or misaligned input
//! - Header parsing that trusts an unauthenticated length
//!
//! The decoder should NEVER panic. Without the sender's key nothing
//! should ever authenticate.

#![no_main]

use libfuzzer_sys::fuzz_target;
use thicket_crypto::SecretKey;
use thicket_proto::{FrameConfig, FrameDecoder, MIN_FRAME_LENGTH};

fuzz_target!(|data: &[u8]| {
    let Some((&length_byte, rest)) = data.split_first() else {
        return;
    };
    let frame_length = MIN_FRAME_LENGTH + usize::from(length_byte);
    let Ok(config) = FrameConfig::new(frame_length) else {
        return;
    };
    let Ok(mut decoder) = FrameDecoder::new(&SecretKey::new([0x5a; 32]), config) else {
        return;
    };

    for chunk in rest.chunks(frame_length) {
        if let Ok(frame) = decoder.decode_frame(chunk) {
            assert!(frame.payload.len() <= config.payload_capacity());
        }
    }
});
