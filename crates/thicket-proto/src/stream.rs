//! Async connection reader and writer.
//!
//! Drives [`FrameEncoder`]/[`FrameDecoder`] over Tokio I/O. Application data
//! is a sequence of messages, each written as a `u32` big-endian length
//! followed by its bytes. Messages are packed back to back into frame
//! payloads and may span any number of frames.
//!
//! ```text
//! [tag: 16][frame 0][frame 1] ... [frame n, final]
//!             │
//!             └─ payload: [len][message][len][message ...
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thicket_crypto::{DirectionalKeys, SecretKey, TAG_LENGTH, Tag, derive_stream_key, encode_tag};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    config::{FrameConfig, MAX_MESSAGE_LENGTH},
    errors::{FramingError, Result},
    frame::{FrameDecoder, FrameEncoder},
};

/// Length prefix of every message
const LENGTH_PREFIX: usize = 4;

/// Read the stream tag from the start of an incoming connection.
///
/// The caller recognises the tag (see `thicket_crypto::try_decode`) and then
/// builds a reader with [`ConnectionReader::recognised`].
pub async fn read_tag<R: AsyncRead + Unpin>(io: &mut R) -> Result<Tag> {
    let mut tag = [0u8; TAG_LENGTH];
    io.read_exact(&mut tag).await?;
    Ok(Tag::from_bytes(tag))
}

/// Writes messages to an outgoing encrypted stream.
///
/// The tag is sent ahead of the first frame. Only the per-stream frame key
/// (inside the encoder) and the tag itself are retained.
///
/// Poisoned by the first error: a failed write may have consumed the tag or
/// a frame number, so every later call returns [`FramingError::Poisoned`].
pub struct ConnectionWriter<W> {
    io: W,
    tag: Option<Tag>,
    encoder: FrameEncoder,
    pending: BytesMut,
    wire: BytesMut,
    poisoned: bool,
}

impl<W: AsyncWrite + Unpin> ConnectionWriter<W> {
    /// Writer for stream `stream_number` under the given outgoing keys.
    ///
    /// # Errors
    ///
    /// - `InvalidFrameLength` if `config` is out of range
    pub fn new(
        io: W,
        keys: &DirectionalKeys,
        stream_number: u64,
        config: FrameConfig,
    ) -> Result<Self> {
        let tag = encode_tag(keys.tag_key(), stream_number);
        let stream_key = derive_stream_key(keys.frame_key(), stream_number);
        let encoder = FrameEncoder::new(&stream_key, config)?;

        Ok(Self {
            io,
            tag: Some(tag),
            encoder,
            pending: BytesMut::with_capacity(config.payload_capacity()),
            wire: BytesMut::with_capacity(config.max_frame_length),
            poisoned: false,
        })
    }

    /// Queue one message, writing every frame it fills.
    ///
    /// # Errors
    ///
    /// - `MessageTooLarge` if the message exceeds `MAX_MESSAGE_LENGTH`
    /// - `FrameNumberExhausted` when the stream runs out of frame numbers
    /// - `Io` on write failure
    /// - `Poisoned` after any earlier error
    pub async fn write_message(&mut self, message: &[u8]) -> Result<()> {
        self.ensure_usable()?;
        let result = self.queue_message(message).await;
        self.poison_on_error(result)
    }

    /// Write any queued bytes as a partial frame and flush the transport.
    ///
    /// # Errors
    ///
    /// - `Io` on write failure
    /// - `Poisoned` after any earlier error
    pub async fn flush(&mut self) -> Result<()> {
        self.ensure_usable()?;
        let result = self.flush_pending().await;
        self.poison_on_error(result)
    }

    /// Write the final frame, flush, and hand back the transport.
    ///
    /// # Errors
    ///
    /// - `Io` on write failure
    /// - `Poisoned` after any earlier error
    pub async fn finish(mut self) -> Result<W> {
        self.ensure_usable()?;
        let chunk = self.pending.split();
        self.write_frame(&chunk, true).await?;
        self.io.flush().await?;
        Ok(self.io)
    }

    /// Frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.encoder.frame_number()
    }

    /// Whether an earlier error left the stream unusable.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.poisoned { Err(FramingError::Poisoned) } else { Ok(()) }
    }

    fn poison_on_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            tracing::debug!(error = %err, "stream writer poisoned");
            self.poisoned = true;
        }
        result
    }

    async fn queue_message(&mut self, message: &[u8]) -> Result<()> {
        if message.len() > MAX_MESSAGE_LENGTH {
            return Err(FramingError::MessageTooLarge {
                size: message.len(),
                max: MAX_MESSAGE_LENGTH,
            });
        }

        // MAX_MESSAGE_LENGTH fits in u32
        self.pending.put_u32(message.len() as u32);
        self.pending.put_slice(message);

        let capacity = self.encoder.payload_capacity();
        while self.pending.len() >= capacity {
            let chunk = self.pending.split_to(capacity);
            self.write_frame(&chunk, false).await?;
        }
        Ok(())
    }

    async fn flush_pending(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            let chunk = self.pending.split();
            self.write_frame(&chunk, false).await?;
        }
        self.io.flush().await?;
        Ok(())
    }

    async fn write_frame(&mut self, payload: &[u8], is_final: bool) -> Result<()> {
        self.wire.clear();
        if let Some(tag) = self.tag.take() {
            self.wire.put_slice(tag.as_bytes());
        }
        self.encoder.encode_frame(payload, is_final, &mut self.wire)?;
        self.io.write_all(&self.wire).await?;
        Ok(())
    }
}

/// Reads messages from an incoming encrypted stream.
///
/// Poisoned by the first error: every later call returns
/// [`FramingError::Poisoned`].
pub struct ConnectionReader<R> {
    io: R,
    decoder: FrameDecoder,
    pending: BytesMut,
    frame: Vec<u8>,
    poisoned: bool,
}

impl<R: AsyncRead + Unpin> ConnectionReader<R> {
    /// Reader for a stream whose tag was already read and recognised as
    /// `stream_number` under a window with `frame_key`.
    ///
    /// # Errors
    ///
    /// - `InvalidFrameLength` if `config` is out of range
    pub fn recognised(
        io: R,
        frame_key: &SecretKey,
        stream_number: u64,
        config: FrameConfig,
    ) -> Result<Self> {
        let stream_key = derive_stream_key(frame_key, stream_number);
        let decoder = FrameDecoder::new(&stream_key, config)?;

        Ok(Self {
            io,
            decoder,
            pending: BytesMut::new(),
            frame: vec![0u8; config.max_frame_length],
            poisoned: false,
        })
    }

    /// Read the tag and check it is the one expected for `stream_number`.
    ///
    /// Used where the stream number is known in advance rather than
    /// recognised by trial.
    ///
    /// # Errors
    ///
    /// - `TagMismatch` if the stream starts with any other tag
    /// - `Truncated` / `Io` if the tag cannot be read
    pub async fn open(
        mut io: R,
        keys: &DirectionalKeys,
        stream_number: u64,
        config: FrameConfig,
    ) -> Result<Self> {
        let tag = read_tag(&mut io).await?;
        if !tag.ct_matches(&encode_tag(keys.tag_key(), stream_number)) {
            return Err(FramingError::TagMismatch);
        }
        Self::recognised(io, keys.frame_key(), stream_number, config)
    }

    /// Read the next message. `Ok(None)` once the final frame has been read
    /// and every message consumed.
    ///
    /// # Errors
    ///
    /// - `Truncated` if the stream ends early or inside a message
    /// - `AuthenticationFailed`, `MalformedHeader`, `InvalidPadding` on
    ///   forged or corrupted frames
    /// - `MessageTooLarge` if a length prefix exceeds `MAX_MESSAGE_LENGTH`
    /// - `Poisoned` after any earlier error
    pub async fn read_message(&mut self) -> Result<Option<Bytes>> {
        if self.poisoned {
            return Err(FramingError::Poisoned);
        }

        let result = self.next_message().await;
        if let Err(err) = &result {
            tracing::debug!(error = %err, "stream reader poisoned");
            self.poisoned = true;
        }
        result
    }

    /// Frames read so far.
    pub fn frames_read(&self) -> u64 {
        self.decoder.frame_number()
    }

    /// Give back the transport.
    pub fn into_inner(self) -> R {
        self.io
    }

    async fn next_message(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(message) = self.take_message()? {
                return Ok(Some(message));
            }

            if self.decoder.is_finished() {
                return if self.pending.is_empty() { Ok(None) } else { Err(FramingError::Truncated) };
            }

            self.io.read_exact(&mut self.frame).await?;
            let decoded = self.decoder.decode_frame(&self.frame)?;
            self.pending.put_slice(&decoded.payload);
        }
    }

    fn take_message(&mut self) -> Result<Option<Bytes>> {
        if self.pending.len() < LENGTH_PREFIX {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX];
        prefix.copy_from_slice(&self.pending[..LENGTH_PREFIX]);
        let length = u32::from_be_bytes(prefix) as usize;

        if length > MAX_MESSAGE_LENGTH {
            return Err(FramingError::MessageTooLarge { size: length, max: MAX_MESSAGE_LENGTH });
        }

        if self.pending.len() < LENGTH_PREFIX + length {
            return Ok(None);
        }

        self.pending.advance(LENGTH_PREFIX);
        Ok(Some(self.pending.split_to(length).freeze()))
    }
}
