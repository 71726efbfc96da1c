//! Sans-IO frame encryption and decryption.
//!
//! A stream after its tag is a sequence of fixed-length frames:
//!
//! ```text
//! ┌──────────────────────────────────────────────┬───────────┐
//! │ XChaCha20 ciphertext of                      │ Poly1305  │
//! │ [header: 4][payload][zero padding]           │ MAC: 16   │
//! └──────────────────────────────────────────────┴───────────┘
//!  ◄──────────────── max_frame_length ─────────────────────►
//! ```
//!
//! Frames are numbered from zero within a stream; the number is the nonce.
//! Since every stream encrypts under its own key (see
//! [`thicket_crypto::derive_stream_key`]), a (key, nonce) pair never repeats.
//!
//! # Security Properties
//!
//! - Confidentiality and integrity of every frame (AEAD)
//! - Ordering: a dropped, duplicated or reordered frame fails authentication
//!   because its nonce no longer matches the receiver's counter
//! - Truncation: only a frame carrying the final flag ends a stream cleanly
//! - Length hiding: every frame has the same length on the wire

use bytes::{BufMut, Bytes};
use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use thicket_crypto::SecretKey;
use zeroize::Zeroize;

use crate::{
    config::{FrameConfig, MAC_LENGTH},
    errors::{FramingError, Result},
    header::{FrameFlags, FrameHeader},
};

/// Largest frame number a stream may use
pub const MAX_FRAME_NUMBER: u64 = u32::MAX as u64;

/// Build the 24-byte nonce for a frame: `frame_number_be || zeros`.
fn frame_nonce(frame_number: u64) -> [u8; 24] {
    let mut nonce = [0u8; 24];
    nonce[..8].copy_from_slice(&frame_number.to_be_bytes());
    nonce
}

fn stream_cipher(stream_key: &SecretKey) -> XChaCha20Poly1305 {
    XChaCha20Poly1305::new(stream_key.as_bytes().into())
}

/// Encrypts payload chunks into numbered frames.
pub struct FrameEncoder {
    cipher: XChaCha20Poly1305,
    config: FrameConfig,
    frame_number: u64,
    finished: bool,
}

impl FrameEncoder {
    /// Encoder for a stream keyed with `stream_key`.
    ///
    /// # Errors
    ///
    /// - `InvalidFrameLength` if `config` is out of range
    pub fn new(stream_key: &SecretKey, config: FrameConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { cipher: stream_cipher(stream_key), config, frame_number: 0, finished: false })
    }

    /// Number the next frame will carry.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Whether the final frame has been written.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Payload bytes one frame can carry.
    pub fn payload_capacity(&self) -> usize {
        self.config.payload_capacity()
    }

    /// Encrypt one frame carrying `payload` and append it to `dst`.
    ///
    /// Exactly `max_frame_length` bytes are appended.
    ///
    /// # Errors
    ///
    /// - `StreamFinished` if the final frame was already written
    /// - `MessageTooLarge` if `payload` exceeds the frame's capacity
    /// - `FrameNumberExhausted` once `MAX_FRAME_NUMBER` frames were written
    pub fn encode_frame(
        &mut self,
        payload: &[u8],
        is_final: bool,
        dst: &mut impl BufMut,
    ) -> Result<()> {
        if self.finished {
            return Err(FramingError::StreamFinished);
        }

        let capacity = self.payload_capacity();
        let Ok(payload_length) = u16::try_from(payload.len()) else {
            return Err(FramingError::MessageTooLarge { size: payload.len(), max: capacity });
        };
        if payload.len() > capacity {
            return Err(FramingError::MessageTooLarge { size: payload.len(), max: capacity });
        }

        if self.frame_number > MAX_FRAME_NUMBER {
            return Err(FramingError::FrameNumberExhausted);
        }

        let mut plaintext = vec![0u8; self.config.max_frame_length - MAC_LENGTH];
        let header = FrameHeader::new(payload_length, FrameFlags::new(is_final));
        plaintext[..FrameHeader::SIZE].copy_from_slice(&header.to_bytes());
        plaintext[FrameHeader::SIZE..FrameHeader::SIZE + payload.len()].copy_from_slice(payload);

        let nonce = frame_nonce(self.frame_number);
        let Ok(ciphertext) = self.cipher.encrypt(XNonce::from_slice(&nonce), plaintext.as_slice())
        else {
            unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
        };
        plaintext.zeroize();

        debug_assert_eq!(ciphertext.len(), self.config.max_frame_length);
        dst.put_slice(&ciphertext);

        self.frame_number += 1;
        self.finished = is_final;
        Ok(())
    }
}

/// A decrypted, validated frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Payload bytes (padding removed)
    pub payload: Bytes,
    /// Whether this was the last frame of the stream
    pub is_final: bool,
}

/// Decrypts and validates numbered frames.
pub struct FrameDecoder {
    cipher: XChaCha20Poly1305,
    config: FrameConfig,
    frame_number: u64,
    finished: bool,
}

impl FrameDecoder {
    /// Decoder for a stream keyed with `stream_key`.
    ///
    /// # Errors
    ///
    /// - `InvalidFrameLength` if `config` is out of range
    pub fn new(stream_key: &SecretKey, config: FrameConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { cipher: stream_cipher(stream_key), config, frame_number: 0, finished: false })
    }

    /// Number the next frame must carry.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Whether the final frame has been read.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Length of every frame on the wire.
    pub fn frame_length(&self) -> usize {
        self.config.max_frame_length
    }

    /// Authenticate and decrypt the next frame.
    ///
    /// # Errors
    ///
    /// - `StreamFinished` if the final frame was already read
    /// - `FrameLengthMismatch` if `frame` is not exactly one frame long
    /// - `FrameNumberExhausted` past `MAX_FRAME_NUMBER`
    /// - `AuthenticationFailed` on wrong key, wrong position or tampering
    /// - `MalformedHeader` / `InvalidPadding` if the authenticated plaintext
    ///   is not well formed
    pub fn decode_frame(&mut self, frame: &[u8]) -> Result<DecodedFrame> {
        if self.finished {
            return Err(FramingError::StreamFinished);
        }

        if frame.len() != self.config.max_frame_length {
            return Err(FramingError::FrameLengthMismatch {
                expected: self.config.max_frame_length,
                actual: frame.len(),
            });
        }

        if self.frame_number > MAX_FRAME_NUMBER {
            return Err(FramingError::FrameNumberExhausted);
        }

        let nonce = frame_nonce(self.frame_number);
        let mut plaintext = self
            .cipher
            .decrypt(XNonce::from_slice(&nonce), frame)
            .map_err(|_| FramingError::AuthenticationFailed { frame_number: self.frame_number })?;

        let parsed = parse_plaintext(&plaintext, self.config.payload_capacity());
        plaintext.zeroize();
        let decoded = parsed?;

        self.frame_number += 1;
        self.finished = decoded.is_final;
        Ok(decoded)
    }
}

fn parse_plaintext(plaintext: &[u8], capacity: usize) -> Result<DecodedFrame> {
    let header = FrameHeader::from_bytes(plaintext, capacity)?;
    let body = &plaintext[FrameHeader::SIZE..];

    let Some((payload, padding)) = body.split_at_checked(usize::from(header.payload_length()))
    else {
        return Err(FramingError::MalformedHeader { reason: "payload exceeds frame" });
    };

    if padding.iter().any(|&b| b != 0) {
        return Err(FramingError::InvalidPadding);
    }

    Ok(DecodedFrame { payload: Bytes::copy_from_slice(payload), is_final: header.flags().is_final() })
}
