//! Thicket Encrypted Framing Layer
//!
//! Turns a raw byte channel (socket, file, relay blob) into a confidential,
//! authenticated, fixed-frame-length stream keyed by the transport key
//! schedule.
//!
//! # Architecture
//!
//! ```text
//!          application messages
//!                  │
//!        ConnectionWriter (async)          ConnectionReader (async)
//!                  │                                ▲
//!          FrameEncoder (sans-IO)           FrameDecoder (sans-IO)
//!                  │                                ▲
//!   [tag][frame 0][frame 1]...[final] ──► read_tag + recognise
//! ```
//!
//! The sans-IO codec in [`frame`] does all cryptography and validation; the
//! types in [`stream`] only move bytes between it and Tokio I/O.
//!
//! # Security
//!
//! - Frames are authenticated before any field is interpreted
//! - Every stream uses its own key, so frame numbers restart safely
//! - Readers fail closed: the first error poisons them

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod errors;
pub mod frame;
pub mod header;
pub mod stream;

pub use config::{
    DEFAULT_FRAME_LENGTH, FrameConfig, MAC_LENGTH, MAX_FRAME_LENGTH, MAX_MESSAGE_LENGTH,
    MIN_FRAME_LENGTH,
};
pub use errors::{FramingError, Result};
pub use frame::{DecodedFrame, FrameDecoder, FrameEncoder, MAX_FRAME_NUMBER};
pub use header::{FrameFlags, FrameHeader};
pub use stream::{ConnectionReader, ConnectionWriter, read_tag};
