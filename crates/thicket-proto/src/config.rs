//! Per-transport framing configuration.

use serde::{Deserialize, Serialize};

use crate::{
    errors::{FramingError, Result},
    header::FrameHeader,
};

/// Poly1305 authentication tag appended to every frame
pub const MAC_LENGTH: usize = 16;

/// Smallest supported frame length
pub const MIN_FRAME_LENGTH: usize = 64;

/// Largest supported frame length. The payload length of a frame must fit
/// the header's 16-bit field.
pub const MAX_FRAME_LENGTH: usize = 32 * 1024;

/// Frame length used when a transport does not choose one
pub const DEFAULT_FRAME_LENGTH: usize = 1024;

/// Largest message a reader accepts (16 MB)
pub const MAX_MESSAGE_LENGTH: usize = 16 * 1024 * 1024;

/// Framing parameters shared by both ends of a stream.
///
/// Both parties must agree on `max_frame_length`: every frame on the wire
/// has exactly this length, so a mismatch makes every frame fail
/// authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Length of every frame on the wire, including the MAC
    pub max_frame_length: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self { max_frame_length: DEFAULT_FRAME_LENGTH }
    }
}

impl FrameConfig {
    /// Config with the given frame length, validated.
    pub fn new(max_frame_length: usize) -> Result<Self> {
        let config = Self { max_frame_length };
        config.validate()?;
        Ok(config)
    }

    /// Check the frame length is within `MIN_FRAME_LENGTH..=MAX_FRAME_LENGTH`.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_FRAME_LENGTH..=MAX_FRAME_LENGTH).contains(&self.max_frame_length) {
            return Err(FramingError::InvalidFrameLength {
                length: self.max_frame_length,
                min: MIN_FRAME_LENGTH,
                max: MAX_FRAME_LENGTH,
            });
        }
        Ok(())
    }

    /// Payload bytes one frame can carry.
    pub fn payload_capacity(&self) -> usize {
        self.max_frame_length - FrameHeader::SIZE - MAC_LENGTH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = FrameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.payload_capacity(), DEFAULT_FRAME_LENGTH - 20);
    }

    #[test]
    fn bounds_are_inclusive() {
        assert!(FrameConfig::new(MIN_FRAME_LENGTH).is_ok());
        assert!(FrameConfig::new(MAX_FRAME_LENGTH).is_ok());
        assert!(matches!(
            FrameConfig::new(MIN_FRAME_LENGTH - 1),
            Err(FramingError::InvalidFrameLength { length: 63, .. })
        ));
        assert!(FrameConfig::new(MAX_FRAME_LENGTH + 1).is_err());
    }

    #[test]
    fn max_payload_fits_header_field() {
        let config = FrameConfig::new(MAX_FRAME_LENGTH).unwrap();
        assert!(u16::try_from(config.payload_capacity()).is_ok());
    }

    #[test]
    fn deserialize_fills_defaults() {
        let config: FrameConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, FrameConfig::default());

        let config: FrameConfig = serde_json::from_str(r#"{"max_frame_length": 4096}"#).unwrap();
        assert_eq!(config.max_frame_length, 4096);
    }
}
