//! Callbacks through which plugins hand connections to the application.

use std::path::Path;

use tokio::sync::mpsc;

use crate::{
    connection::{DuplexConnection, SimplexReader},
    properties::ContactId,
};

/// Receives connections from a duplex plugin.
///
/// Called from plugin tasks; implementations must not block.
pub trait DuplexCallback: Send + Sync {
    /// A contact (not yet identified) connected to us.
    fn incoming_connection_created(&self, connection: DuplexConnection);

    /// A connection we made to `contact` succeeded.
    fn outgoing_connection_created(&self, contact: ContactId, connection: DuplexConnection);
}

/// Receives readers from a simplex plugin.
pub trait SimplexCallback: Send + Sync {
    /// A connection file was found on an inserted drive.
    fn reader_created(&self, reader: SimplexReader);

    /// The caller finished with a reader. `recognised` is false if its tag
    /// matched no contact.
    fn reader_finished(&self, _path: &Path, _recognised: bool) {}

    /// The caller finished writing a connection file.
    fn writer_finished(&self, _path: &Path) {}
}

/// Connection delivered by a [`ChannelDuplexCallback`].
#[derive(Debug)]
pub enum DuplexEvent {
    /// From [`DuplexCallback::incoming_connection_created`]
    Incoming(DuplexConnection),
    /// From [`DuplexCallback::outgoing_connection_created`]
    Outgoing(ContactId, DuplexConnection),
}

/// Forwards duplex connections into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelDuplexCallback {
    sender: mpsc::UnboundedSender<DuplexEvent>,
}

impl ChannelDuplexCallback {
    /// Callback and the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DuplexEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl DuplexCallback for ChannelDuplexCallback {
    fn incoming_connection_created(&self, connection: DuplexConnection) {
        if self.sender.send(DuplexEvent::Incoming(connection)).is_err() {
            tracing::debug!("incoming connection dropped, receiver closed");
        }
    }

    fn outgoing_connection_created(&self, contact: ContactId, connection: DuplexConnection) {
        if self.sender.send(DuplexEvent::Outgoing(contact, connection)).is_err() {
            tracing::debug!(contact = %contact, "outgoing connection dropped, receiver closed");
        }
    }
}

/// Forwards simplex readers into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSimplexCallback {
    sender: mpsc::UnboundedSender<SimplexReader>,
}

impl ChannelSimplexCallback {
    /// Callback and the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SimplexReader>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl SimplexCallback for ChannelSimplexCallback {
    fn reader_created(&self, reader: SimplexReader) {
        if let Err(mpsc::error::SendError(reader)) = self.sender.send(reader) {
            tracing::debug!(path = %reader.path().display(), "reader dropped, receiver closed");
        }
    }

    fn reader_finished(&self, path: &Path, recognised: bool) {
        tracing::debug!(path = %path.display(), recognised, "reader finished");
    }

    fn writer_finished(&self, path: &Path) {
        tracing::debug!(path = %path.display(), "writer finished");
    }
}
