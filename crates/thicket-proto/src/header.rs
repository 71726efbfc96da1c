//! Frame header with zero-copy parsing.
//!
//! The header is the first 4 bytes of every decrypted frame:
//!
//! ```text
//! ┌────────────────────┬─────────┬──────────┐
//! │ payload_length u16 │ flags u8│ reserved │
//! │ (big endian)       │         │ u8 = 0   │
//! └────────────────────┴─────────┴──────────┘
//! ```
//!
//! It is only ever parsed after the frame has been authenticated, so a
//! malformed header means a broken sender rather than a forgery.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::errors::{FramingError, Result};

/// Frame flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// Last frame of the stream
    pub const FINAL: u8 = 0b0000_0001;

    /// Flags for a final or non-final frame.
    pub const fn new(is_final: bool) -> Self {
        if is_final { Self(Self::FINAL) } else { Self(0) }
    }

    /// Parse a flag byte, rejecting unknown bits.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        if byte & !Self::FINAL == 0 { Some(Self(byte)) } else { None }
    }

    /// Raw flag byte.
    pub const fn to_byte(self) -> u8 {
        self.0
    }

    /// Whether the final bit is set.
    pub const fn is_final(self) -> bool {
        self.0 & Self::FINAL != 0
    }
}

/// Fixed 4-byte frame header (big endian).
///
/// # Security
///
/// The `#[repr(C)]` layout of byte arrays makes every 4-byte pattern a valid
/// `FrameHeader`, so casting decrypted bytes cannot cause undefined behavior.
/// Semantic checks (flags, reserved byte, payload bound) happen in
/// [`FrameHeader::from_bytes`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    payload_length: [u8; 2],
    flags: u8,
    reserved: u8,
}

impl FrameHeader {
    /// Size of the serialized header
    pub const SIZE: usize = 4;

    /// Header for a frame carrying `payload_length` bytes.
    pub const fn new(payload_length: u16, flags: FrameFlags) -> Self {
        Self { payload_length: payload_length.to_be_bytes(), flags: flags.to_byte(), reserved: 0 }
    }

    /// Parse a header from the start of a decrypted frame.
    ///
    /// # Errors
    ///
    /// - `MalformedHeader` if the buffer is shorter than the header, unknown
    ///   flag bits or the reserved byte are set, or the payload length
    ///   exceeds `capacity`
    pub fn from_bytes(bytes: &[u8], capacity: usize) -> Result<&Self> {
        let (header, _) = Self::ref_from_prefix(bytes)
            .map_err(|_| FramingError::MalformedHeader { reason: "short header" })?;

        if FrameFlags::from_byte(header.flags).is_none() {
            return Err(FramingError::MalformedHeader { reason: "unknown flag bits" });
        }

        if header.reserved != 0 {
            return Err(FramingError::MalformedHeader { reason: "reserved byte set" });
        }

        if usize::from(header.payload_length()) > capacity {
            return Err(FramingError::MalformedHeader { reason: "payload exceeds frame" });
        }

        Ok(header)
    }

    /// Serialize the header.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(IntoBytes::as_bytes(self));
        arr
    }

    /// Payload bytes carried by this frame.
    pub fn payload_length(&self) -> u16 {
        u16::from_be_bytes(self.payload_length)
    }

    /// Frame flags.
    pub fn flags(&self) -> FrameFlags {
        FrameFlags(self.flags)
    }
}
