//! The lifecycle contract every transport plugin implements.
//!
//! ```text
//!            start()                      stop()
//! Stopped ──────────► Starting ──► Running ──────► Stopping ──► Stopped
//!    ▲                   │                                        │
//!    └── invalid maps ───┘                                        │
//!    └────────────────────────────────────────────────────────────┘
//! ```
//!
//! A plugin owns background work (a listening socket, a drive monitor) only
//! while Running. Connections are handed to the caller through a callback,
//! never returned from `start`.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thicket_crypto::TransportId;
use thicket_proto::FrameConfig;

use crate::{
    error::PluginError,
    properties::{ContactId, PluginConfig, RemoteProperties, TransportProperties},
};

/// Lifecycle state of a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginState {
    /// Not started, or fully stopped
    Stopped,
    /// `start` accepted, background work being spawned
    Starting,
    /// Accepting and making connections
    Running,
    /// `stop` in progress, background work being torn down
    Stopping,
}

/// Whether connections carry data both ways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Bidirectional connection (sockets)
    Duplex,
    /// One-way reader or writer (removable drives)
    Simplex,
}

/// Static properties of a transport, queried before using it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Duplex or simplex
    pub direction: Direction,
    /// How often the caller should poll; `None` if the plugin cannot poll
    pub polling_interval: Option<Duration>,
    /// Frame length used on this transport's streams
    pub max_frame_length: usize,
    /// Upper bound on delivery latency, used to size rotation overlap
    pub max_latency: Duration,
}

impl Capabilities {
    /// Whether [`Plugin::poll`] may be called.
    pub fn supports_polling(&self) -> bool {
        self.polling_interval.is_some()
    }

    /// Framing configuration for streams over this transport. Validated
    /// when a reader or writer is built from it.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig { max_frame_length: self.max_frame_length }
    }
}

/// A pluggable transport.
///
/// Control methods serialise through the plugin's own lock and never block
/// on I/O; bind, connect, and drive work happens in spawned tasks that
/// re-check the state after every step that can block.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Receiver of the connections this plugin creates.
    type Callback: ?Sized + Send + Sync;

    /// Transport this plugin implements.
    fn id(&self) -> &TransportId;

    /// Static capabilities.
    fn capabilities(&self) -> Capabilities;

    /// Current lifecycle state.
    fn state(&self) -> PluginState;

    /// Validate the maps, enter Running and spawn background work.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless Stopped
    /// - `InvalidProperties` / `InvalidConfig` if a map fails validation;
    ///   the plugin stays Stopped
    async fn start(
        &self,
        local: TransportProperties,
        remote: RemoteProperties,
        config: PluginConfig,
        callback: Arc<Self::Callback>,
    ) -> Result<(), PluginError>;

    /// Tear down background work and return to Stopped.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless Running
    async fn stop(&self) -> Result<(), PluginError>;

    /// Replace this device's properties. Affects later attempts only.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless Running
    /// - `InvalidProperties` if validation fails
    fn set_local_properties(&self, local: TransportProperties) -> Result<(), PluginError>;

    /// Replace one contact's properties. Affects later attempts only.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless Running
    /// - `InvalidProperties` if validation fails
    fn set_remote_properties(
        &self,
        contact: ContactId,
        remote: TransportProperties,
    ) -> Result<(), PluginError>;

    /// Replace the plugin config. Affects later attempts only.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless Running
    /// - `InvalidConfig` if validation fails
    fn set_config(&self, config: PluginConfig) -> Result<(), PluginError>;

    /// Spawn one connection attempt per known contact not in `connected`.
    ///
    /// Returns the number of attempts spawned. Results arrive through the
    /// callback.
    ///
    /// # Errors
    ///
    /// - `PollingUnsupported` if [`Capabilities::supports_polling`] is false
    /// - `InvalidState` unless Running
    async fn poll(&self, connected: &BTreeSet<ContactId>) -> Result<usize, PluginError>;
}
