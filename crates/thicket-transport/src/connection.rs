//! Raw connections handed out by plugins.
//!
//! A plugin only moves bytes. The caller decides which stream keys apply and
//! turns each raw half into a framed reader or writer:
//!
//! ```text
//! DuplexConnection ──split()──► RawReader ──read_tag + recognise──► ConnectionReader
//!                          └──► RawWriter ──into_writer(StreamContext)──► ConnectionWriter
//!
//! SimplexReader (file on a drive)   SimplexWriter (fresh file on a drive)
//! ```

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use thicket_core::{IncomingStream, StreamContext};
use thicket_crypto::Tag;
use thicket_proto::{ConnectionReader, ConnectionWriter, FrameConfig, Result, read_tag};
use tokio::{
    fs::File,
    io::{AsyncRead, AsyncWrite},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
};

use crate::properties::ContactId;

/// Incoming half of a connection, before its tag has been read.
#[derive(Debug)]
pub struct RawReader<R> {
    io: R,
    config: FrameConfig,
}

impl<R: AsyncRead + Unpin> RawReader<R> {
    /// Wrap `io`, framed with `config` once recognised.
    pub fn new(io: R, config: FrameConfig) -> Self {
        Self { io, config }
    }

    /// Read the stream tag for recognition by the key manager.
    ///
    /// # Errors
    ///
    /// - `Truncated` / `Io` if the tag cannot be read
    pub async fn read_tag(&mut self) -> Result<Tag> {
        read_tag(&mut self.io).await
    }

    /// Frame the rest of the stream under the recognised stream's keys.
    ///
    /// # Errors
    ///
    /// - `InvalidFrameLength` if the transport's frame config is out of range
    pub fn into_reader(self, stream: &IncomingStream) -> Result<ConnectionReader<R>> {
        ConnectionReader::recognised(self.io, stream.frame_key(), stream.stream_number(), self.config)
    }

    /// Give back the raw transport.
    pub fn into_inner(self) -> R {
        self.io
    }
}

/// Outgoing half of a connection, before any stream has been opened.
#[derive(Debug)]
pub struct RawWriter<W> {
    io: W,
    config: FrameConfig,
}

impl<W: AsyncWrite + Unpin> RawWriter<W> {
    /// Wrap `io`, framed with `config`.
    pub fn new(io: W, config: FrameConfig) -> Self {
        Self { io, config }
    }

    /// Open an outgoing stream on this half.
    ///
    /// # Errors
    ///
    /// - `InvalidFrameLength` if the transport's frame config is out of range
    pub fn into_writer(self, stream: &StreamContext) -> Result<ConnectionWriter<W>> {
        ConnectionWriter::new(self.io, stream.outgoing(), stream.stream_number(), self.config)
    }

    /// Give back the raw transport.
    pub fn into_inner(self) -> W {
        self.io
    }
}

/// A bidirectional socket connection.
#[derive(Debug)]
pub struct DuplexConnection {
    stream: TcpStream,
    peer: SocketAddr,
    config: FrameConfig,
}

impl DuplexConnection {
    /// Wrap a connected socket.
    pub fn new(stream: TcpStream, peer: SocketAddr, config: FrameConfig) -> Self {
        Self { stream, peer, config }
    }

    /// Address at the other end of the socket. For Tor connections this is
    /// the local proxy or hidden-service forwarder, not the contact.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Framing config for streams on this connection.
    pub fn frame_config(&self) -> FrameConfig {
        self.config
    }

    /// Split into independently owned incoming and outgoing halves.
    pub fn split(self) -> (RawReader<OwnedReadHalf>, RawWriter<OwnedWriteHalf>) {
        let (read, write) = self.stream.into_split();
        (RawReader::new(read, self.config), RawWriter::new(write, self.config))
    }

    /// Give back the socket.
    pub fn into_inner(self) -> TcpStream {
        self.stream
    }
}

/// One connection file found on an inserted drive.
#[derive(Debug)]
pub struct SimplexReader {
    path: PathBuf,
    raw: RawReader<File>,
}

impl SimplexReader {
    pub(crate) fn new(path: PathBuf, file: File, config: FrameConfig) -> Self {
        Self { path, raw: RawReader::new(file, config) }
    }

    /// File being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stream tag for recognition by the key manager.
    ///
    /// # Errors
    ///
    /// - `Truncated` / `Io` if the tag cannot be read
    pub async fn read_tag(&mut self) -> Result<Tag> {
        self.raw.read_tag().await
    }

    /// Frame the rest of the file under the recognised stream's keys.
    ///
    /// # Errors
    ///
    /// - `InvalidFrameLength` if the transport's frame config is out of range
    pub fn into_reader(self, stream: &IncomingStream) -> Result<ConnectionReader<File>> {
        self.raw.into_reader(stream)
    }
}

/// A freshly created connection file on an output drive.
#[derive(Debug)]
pub struct SimplexWriter {
    path: PathBuf,
    contact: ContactId,
    raw: RawWriter<File>,
}

impl SimplexWriter {
    pub(crate) fn new(path: PathBuf, contact: ContactId, file: File, config: FrameConfig) -> Self {
        Self { path, contact, raw: RawWriter::new(file, config) }
    }

    /// File being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Contact the file is meant for.
    pub fn contact(&self) -> ContactId {
        self.contact
    }

    /// Open the outgoing stream in this file.
    ///
    /// # Errors
    ///
    /// - `InvalidFrameLength` if the transport's frame config is out of range
    pub fn into_writer(self, stream: &StreamContext) -> Result<ConnectionWriter<File>> {
        self.raw.into_writer(stream)
    }
}
