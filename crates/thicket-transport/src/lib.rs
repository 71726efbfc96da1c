//! Thicket Transport Plugins
//!
//! Moves encrypted streams over physical transports. Every transport
//! implements the same [`Plugin`] lifecycle; sockets and removable drives
//! differ only in the connections they hand to the application.
//!
//! # Architecture
//!
//! ```text
//!                     ┌──────────────────────────────┐
//!  application ──────►│ Plugin (start/stop/poll/set) │
//!                     └──────────────┬───────────────┘
//!                                    │ PluginControl: state + Arc<PluginSnapshot>
//!               ┌────────────────────┴────────────────────┐
//!        SocketPlugin<S>                              DrivePlugin
//!        ├── LanStrategy (TCP)                        ├── DriveMonitor (insertions)
//!        └── TorStrategy (SOCKS5 → onion)             └── DriveFinder + DriveChooser
//!               │                                         │
//!        DuplexCallback ◄── DuplexConnection       SimplexCallback ◄── SimplexReader
//! ```
//!
//! Connections carry raw bytes. The application reads the tag, recognises
//! it with its key manager, and wraps the connection with `into_reader` or
//! `into_writer` from [`connection`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod callback;
pub mod connection;
pub mod control;
pub mod drive;
pub mod error;
pub mod plugin;
pub mod properties;
pub mod socket;

pub use callback::{
    ChannelDuplexCallback, ChannelSimplexCallback, DuplexCallback, DuplexEvent, SimplexCallback,
};
pub use connection::{DuplexConnection, RawReader, RawWriter, SimplexReader, SimplexWriter};
pub use control::{PluginControl, PluginSnapshot, RunId};
pub use drive::{DRIVE_TRANSPORT_ID, DrivePlugin, is_connection_filename};
pub use error::PluginError;
pub use plugin::{Capabilities, Direction, Plugin, PluginState};
pub use properties::{
    ContactId, InvalidValue, PluginConfig, PropertyMap, RemoteProperties, TransportProperties,
};
pub use socket::{
    LanStrategy, SocketPlugin, SocketPluginConfig, SocketStrategy, TorStrategy,
};
