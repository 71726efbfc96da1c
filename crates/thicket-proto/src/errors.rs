//! Error types for the framing layer.

use thiserror::Error;

/// Result alias for framing operations.
pub type Result<T> = std::result::Result<T, FramingError>;

/// Errors produced while writing or reading an encrypted stream.
///
/// Apart from [`FramingError::Io`] every variant means the stream is broken
/// or forged. Readers and writers are poisoned after the first error of any kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Configured frame length outside the supported range
    #[error("invalid frame length {length} (must be {min}..={max})")]
    InvalidFrameLength {
        /// Requested frame length
        length: usize,
        /// Smallest supported frame length
        min: usize,
        /// Largest supported frame length
        max: usize,
    },

    /// Frame buffer does not have the configured length
    #[error("frame length mismatch: expected {expected}, got {actual}")]
    FrameLengthMismatch {
        /// Configured frame length
        expected: usize,
        /// Actual buffer length
        actual: usize,
    },

    /// Frame failed AEAD authentication (wrong key, order, or tampering)
    #[error("frame {frame_number} failed authentication")]
    AuthenticationFailed {
        /// Frame number the decoder expected
        frame_number: u64,
    },

    /// Decrypted header is not well formed
    #[error("malformed frame header: {reason}")]
    MalformedHeader {
        /// What was wrong with it
        reason: &'static str,
    },

    /// Padding after the payload is not all zero
    #[error("frame padding is not zero")]
    InvalidPadding,

    /// All frame numbers of this stream have been used
    #[error("frame number space exhausted")]
    FrameNumberExhausted,

    /// A frame arrived after the final frame, or the encoder was used after
    /// finishing
    #[error("stream already finished")]
    StreamFinished,

    /// Stream tag does not match the expected tag
    #[error("stream tag mismatch")]
    TagMismatch,

    /// Message exceeds the maximum message length
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge {
        /// Message length
        size: usize,
        /// Maximum accepted length
        max: usize,
    },

    /// Stream ended before the final frame or inside a message
    #[error("stream truncated")]
    Truncated,

    /// A previous error left the stream unusable
    #[error("stream poisoned by earlier error")]
    Poisoned,

    /// Underlying I/O failure
    #[error("i/o error: {0}")]
    Io(String),
}

impl FramingError {
    /// True if the peer sent data that cannot come from an honest sender
    /// holding the right keys.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. }
                | Self::MalformedHeader { .. }
                | Self::InvalidPadding
                | Self::StreamFinished
                | Self::TagMismatch
                | Self::MessageTooLarge { .. }
        )
    }

    /// True if the stream must be abandoned. Every framing error ends the
    /// stream; only I/O errors may be worth retrying on a new stream.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

impl From<std::io::Error> for FramingError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::Io(err.to_string())
        }
    }
}
