//! TCP socket plugins.
//!
//! [`SocketPlugin`] owns the lifecycle: it listens in a background task,
//! dials contacts when polled, and hands sockets to a [`DuplexCallback`].
//! A [`SocketStrategy`] supplies everything transport-specific: which
//! address to bind, how to validate properties, and how to reach a contact.
//!
//! ```text
//! start ──► acceptor task: bind ──► record bound port ──► accept loop
//!                                                            │
//! poll ───► one task per unconnected contact: dial ──► live? ─┴─► callback
//! ```
//!
//! Bind and connect failures are not errors. They are logged and the plugin
//! simply has no connection to hand out; callers retry on the next poll.

mod lan;
mod socks;
mod tor;

use std::{
    collections::BTreeSet,
    io,
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
pub use lan::{LAN_TRANSPORT_ID, LanStrategy};
use serde::{Deserialize, Serialize};
pub use socks::socks5_connect;
use thicket_crypto::TransportId;
use tokio::net::{TcpListener, TcpStream};
pub use tor::{DEFAULT_SOCKS_PORT, HIDDEN_SERVICE_PORT, TOR_TRANSPORT_ID, TorStrategy, is_valid_onion};

use crate::{
    callback::DuplexCallback,
    connection::DuplexConnection,
    control::{PluginControl, PluginSnapshot, RunId},
    error::PluginError,
    plugin::{Capabilities, Plugin, PluginState},
    properties::{ContactId, InvalidValue, PluginConfig, RemoteProperties, TransportProperties},
};

/// Property key holding an IP address
pub const ADDRESS: &str = "address";

/// Property (or config) key holding a TCP port
pub const PORT: &str = "port";

/// Settings shared by every socket plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketPluginConfig {
    /// Upper bound on one outgoing attempt, proxy handshake included
    pub connect_timeout: Duration,
}

impl Default for SocketPluginConfig {
    fn default() -> Self {
        Self { connect_timeout: Duration::from_secs(30) }
    }
}

/// Transport-specific half of a socket plugin.
#[async_trait]
pub trait SocketStrategy: Send + Sync + 'static {
    /// Transport implemented.
    fn transport_id(&self) -> &TransportId;

    /// Static capabilities.
    fn capabilities(&self) -> Capabilities;

    /// Check this device's properties.
    fn validate_local(&self, local: &TransportProperties) -> Result<(), InvalidValue>;

    /// Check one contact's properties.
    fn validate_remote(&self, remote: &TransportProperties) -> Result<(), InvalidValue>;

    /// Check the plugin config.
    fn validate_config(&self, _config: &PluginConfig) -> Result<(), InvalidValue> {
        Ok(())
    }

    /// Address to listen on, or `None` to accept nothing.
    fn bind_address(&self, snapshot: &PluginSnapshot) -> Option<SocketAddr>;

    /// Update this device's properties once the listener is bound.
    fn record_bound(&self, _local: &mut TransportProperties, _bound: SocketAddr) {}

    /// Dial `contact`. `Ok(None)` if its properties give no usable address.
    async fn connect(
        &self,
        snapshot: &PluginSnapshot,
        contact: ContactId,
    ) -> io::Result<Option<TcpStream>>;
}

struct Shared<S> {
    config: SocketPluginConfig,
    control: PluginControl<dyn DuplexCallback>,
    strategy: S,
}

/// Duplex plugin over TCP, parameterised by a [`SocketStrategy`].
pub struct SocketPlugin<S> {
    shared: Arc<Shared<S>>,
}

impl<S: SocketStrategy> SocketPlugin<S> {
    /// Plugin with the default [`SocketPluginConfig`].
    pub fn new(strategy: S) -> Self {
        Self::with_config(strategy, SocketPluginConfig::default())
    }

    /// Plugin with explicit settings.
    pub fn with_config(strategy: S, config: SocketPluginConfig) -> Self {
        Self { shared: Arc::new(Shared { config, control: PluginControl::new(), strategy }) }
    }

    /// The strategy in use.
    pub fn strategy(&self) -> &S {
        &self.shared.strategy
    }

    /// This device's current properties, including any bound port.
    pub fn local_properties(&self) -> TransportProperties {
        self.shared.control.snapshot().local.clone()
    }

    /// Make one outgoing attempt to `contact` and wait for it.
    ///
    /// `None` if the plugin is not Running, the contact has no usable
    /// address, the attempt fails, or the plugin was stopped (or restarted)
    /// while dialing.
    pub async fn create_connection(&self, contact: ContactId) -> Option<DuplexConnection> {
        let run = self.shared.control.running("create_connection").ok()?;
        let connection = self.shared.connect(contact).await?;
        if !self.shared.control.is_current(run) {
            tracing::debug!(
                transport = %self.shared.strategy.transport_id(),
                contact = %contact,
                "stopped while connecting, dropping connection"
            );
            return None;
        }
        Some(connection)
    }

    fn validate_remote(&self, remote: &TransportProperties) -> Result<(), PluginError> {
        self.shared.strategy.validate_remote(remote).map_err(PluginError::InvalidProperties)
    }
}

impl<S: SocketStrategy> Shared<S> {
    async fn connect(&self, contact: ContactId) -> Option<DuplexConnection> {
        let transport = self.strategy.transport_id();
        let snapshot = self.control.snapshot();
        let attempt = self.strategy.connect(&snapshot, contact);

        let stream = match tokio::time::timeout(self.config.connect_timeout, attempt).await {
            Ok(Ok(Some(stream))) => stream,
            Ok(Ok(None)) => {
                tracing::debug!(transport = %transport, contact = %contact, "no usable address");
                return None;
            },
            Ok(Err(err)) => {
                tracing::debug!(
                    transport = %transport,
                    contact = %contact,
                    error = %err,
                    "connection attempt failed"
                );
                return None;
            },
            Err(_) => {
                tracing::debug!(transport = %transport, contact = %contact, "connection attempt timed out");
                return None;
            },
        };

        let peer = match stream.peer_addr() {
            Ok(peer) => peer,
            Err(err) => {
                tracing::debug!(transport = %transport, error = %err, "connected socket has no peer");
                return None;
            },
        };
        Some(DuplexConnection::new(stream, peer, self.strategy.capabilities().frame_config()))
    }

    async fn accept_loop(self: Arc<Self>, run: RunId) {
        let transport = self.strategy.transport_id();
        let snapshot = self.control.snapshot();
        let Some(address) = self.strategy.bind_address(&snapshot) else {
            tracing::debug!(transport = %transport, "no bind address, not listening");
            return;
        };

        let listener = match TcpListener::bind(address).await {
            Ok(listener) => listener,
            Err(err) => {
                tracing::warn!(transport = %transport, %address, error = %err, "failed to bind");
                return;
            },
        };
        let bound = match listener.local_addr() {
            Ok(bound) => bound,
            Err(err) => {
                tracing::warn!(transport = %transport, error = %err, "bound socket has no address");
                return;
            },
        };

        if !self.control.record_local(run, |local| self.strategy.record_bound(local, bound)) {
            tracing::debug!(transport = %transport, "stopped while binding");
            return;
        }
        tracing::info!(transport = %transport, address = %bound, "listening");

        let frame_config = self.strategy.capabilities().frame_config();
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    tracing::warn!(transport = %transport, error = %err, "accept failed, no longer listening");
                    return;
                },
            };

            let Some(callback) = self.control.live_callback(run) else {
                return;
            };
            tracing::debug!(transport = %transport, %peer, "incoming connection");
            callback.incoming_connection_created(DuplexConnection::new(stream, peer, frame_config));
        }
    }
}

#[async_trait]
impl<S: SocketStrategy> Plugin for SocketPlugin<S> {
    type Callback = dyn DuplexCallback;

    fn id(&self) -> &TransportId {
        self.shared.strategy.transport_id()
    }

    fn capabilities(&self) -> Capabilities {
        self.shared.strategy.capabilities()
    }

    fn state(&self) -> PluginState {
        self.shared.control.state()
    }

    async fn start(
        &self,
        local: TransportProperties,
        remote: RemoteProperties,
        config: PluginConfig,
        callback: Arc<dyn DuplexCallback>,
    ) -> Result<(), PluginError> {
        let state = self.state();
        if state != PluginState::Stopped {
            return Err(PluginError::InvalidState { operation: "start", state });
        }

        let strategy = &self.shared.strategy;
        strategy.validate_local(&local).map_err(PluginError::InvalidProperties)?;
        for properties in remote.values() {
            self.validate_remote(properties)?;
        }
        strategy.validate_config(&config).map_err(PluginError::InvalidConfig)?;

        let run =
            self.shared.control.begin_start(PluginSnapshot { local, remote, config }, callback)?;
        let acceptor = tokio::spawn(Arc::clone(&self.shared).accept_loop(run));
        self.shared.control.finish_start(Some(acceptor));

        tracing::debug!(transport = %self.id(), "plugin started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), PluginError> {
        let acceptor = self.shared.control.begin_stop()?;
        if let Some(acceptor) = acceptor {
            acceptor.abort();
            // Awaiting the aborted task guarantees the listener is dropped
            if let Err(err) = acceptor.await
                && err.is_panic()
            {
                tracing::warn!(transport = %self.id(), error = %err, "acceptor panicked");
            }
        }
        self.shared.control.finish_stop();

        tracing::debug!(transport = %self.id(), "plugin stopped");
        Ok(())
    }

    fn set_local_properties(&self, local: TransportProperties) -> Result<(), PluginError> {
        self.shared.strategy.validate_local(&local).map_err(PluginError::InvalidProperties)?;
        self.shared.control.update("set_local_properties", |snapshot| snapshot.local = local)
    }

    fn set_remote_properties(
        &self,
        contact: ContactId,
        remote: TransportProperties,
    ) -> Result<(), PluginError> {
        self.validate_remote(&remote)?;
        self.shared.control.update("set_remote_properties", |snapshot| {
            snapshot.remote.insert(contact, remote);
        })
    }

    fn set_config(&self, config: PluginConfig) -> Result<(), PluginError> {
        self.shared.strategy.validate_config(&config).map_err(PluginError::InvalidConfig)?;
        self.shared.control.update("set_config", |snapshot| snapshot.config = config)
    }

    async fn poll(&self, connected: &BTreeSet<ContactId>) -> Result<usize, PluginError> {
        if !self.capabilities().supports_polling() {
            return Err(PluginError::PollingUnsupported { transport_id: self.id().clone() });
        }
        let run = self.shared.control.running("poll")?;

        let contacts = self.shared.control.unconnected_contacts(connected);
        for &contact in &contacts {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                let Some(connection) = shared.connect(contact).await else {
                    return;
                };
                match shared.control.live_callback(run) {
                    Some(callback) => callback.outgoing_connection_created(contact, connection),
                    None => tracing::debug!(
                        transport = %shared.strategy.transport_id(),
                        contact = %contact,
                        "stopped while connecting, dropping connection"
                    ),
                }
            });
        }
        Ok(contacts.len())
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::Semaphore;

    use super::*;
    use crate::callback::{ChannelDuplexCallback, DuplexEvent};

    /// Dials `target`, but only once a permit is released.
    struct GatedStrategy {
        lan: LanStrategy,
        gate: Arc<Semaphore>,
        target: SocketAddr,
    }

    #[async_trait]
    impl SocketStrategy for GatedStrategy {
        fn transport_id(&self) -> &TransportId {
            self.lan.transport_id()
        }

        fn capabilities(&self) -> Capabilities {
            self.lan.capabilities()
        }

        fn validate_local(&self, _local: &TransportProperties) -> Result<(), InvalidValue> {
            Ok(())
        }

        fn validate_remote(&self, _remote: &TransportProperties) -> Result<(), InvalidValue> {
            Ok(())
        }

        fn bind_address(&self, _snapshot: &PluginSnapshot) -> Option<SocketAddr> {
            None
        }

        async fn connect(
            &self,
            _snapshot: &PluginSnapshot,
            _contact: ContactId,
        ) -> io::Result<Option<TcpStream>> {
            self.gate.acquire().await.map_err(io::Error::other)?.forget();
            TcpStream::connect(self.target).await.map(Some)
        }
    }

    fn callback() -> Arc<dyn DuplexCallback> {
        let (callback, _events) = ChannelDuplexCallback::channel();
        Arc::new(callback)
    }

    fn unreachable_local() -> TransportProperties {
        // TEST-NET-1, never assigned to a local interface
        TransportProperties::new().with(ADDRESS, "192.0.2.1").with(PORT, "0")
    }

    #[tokio::test]
    async fn unreachable_bind_stays_running() {
        let plugin = SocketPlugin::new(LanStrategy::new());
        plugin
            .start(unreachable_local(), RemoteProperties::new(), PluginConfig::new(), callback())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(plugin.state(), PluginState::Running);

        plugin.stop().await.unwrap();
        assert_eq!(plugin.state(), PluginState::Stopped);
    }

    #[tokio::test]
    async fn stop_twice_fails() {
        let plugin = SocketPlugin::new(LanStrategy::new());
        plugin
            .start(unreachable_local(), RemoteProperties::new(), PluginConfig::new(), callback())
            .await
            .unwrap();

        plugin.stop().await.unwrap();
        let err = plugin.stop().await.unwrap_err();
        assert_eq!(err, PluginError::InvalidState { operation: "stop", state: PluginState::Stopped });
    }

    #[tokio::test]
    async fn start_twice_fails() {
        let plugin = SocketPlugin::new(LanStrategy::new());
        plugin
            .start(unreachable_local(), RemoteProperties::new(), PluginConfig::new(), callback())
            .await
            .unwrap();

        let err = plugin
            .start(unreachable_local(), RemoteProperties::new(), PluginConfig::new(), callback())
            .await
            .unwrap_err();
        assert!(err.is_contract_violation());
        plugin.stop().await.unwrap();
    }

    #[tokio::test]
    async fn invalid_properties_leave_plugin_stopped() {
        let plugin = SocketPlugin::new(LanStrategy::new());
        let local = TransportProperties::new().with(PORT, "not-a-port");

        let err = plugin
            .start(local, RemoteProperties::new(), PluginConfig::new(), callback())
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::InvalidProperties(ref v) if v.key == PORT));
        assert_eq!(plugin.state(), PluginState::Stopped);
    }

    #[tokio::test]
    async fn setters_require_running() {
        let plugin = SocketPlugin::new(LanStrategy::new());
        assert!(plugin.set_local_properties(TransportProperties::new()).is_err());
        assert!(plugin.set_remote_properties(ContactId::new(1), TransportProperties::new()).is_err());
        assert!(plugin.set_config(PluginConfig::new()).is_err());
    }

    #[tokio::test]
    async fn poll_requires_running() {
        let plugin = SocketPlugin::new(LanStrategy::new());
        let err = plugin.poll(&BTreeSet::new()).await.unwrap_err();
        assert_eq!(err, PluginError::InvalidState { operation: "poll", state: PluginState::Stopped });
    }

    #[tokio::test]
    async fn create_connection_when_stopped_is_none() {
        let plugin = SocketPlugin::new(LanStrategy::new());
        assert!(plugin.create_connection(ContactId::new(1)).await.is_none());
    }

    #[tokio::test]
    async fn contact_without_address_is_none() {
        let plugin = SocketPlugin::new(LanStrategy::new());
        let mut remote = RemoteProperties::new();
        remote.insert(ContactId::new(1), TransportProperties::new());
        plugin.start(unreachable_local(), remote, PluginConfig::new(), callback()).await.unwrap();

        assert!(plugin.create_connection(ContactId::new(1)).await.is_none());
        assert!(plugin.create_connection(ContactId::new(2)).await.is_none());
        plugin.stop().await.unwrap();
    }

    #[tokio::test]
    async fn dial_from_previous_run_is_dropped() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let plugin = SocketPlugin::new(GatedStrategy {
            lan: LanStrategy::new(),
            gate: Arc::clone(&gate),
            target: listener.local_addr().unwrap(),
        });
        let contact = ContactId::new(1);
        let mut remote = RemoteProperties::new();
        remote.insert(contact, TransportProperties::new());

        let (first, mut first_events) = ChannelDuplexCallback::channel();
        plugin
            .start(TransportProperties::new(), remote.clone(), PluginConfig::new(), Arc::new(first))
            .await
            .unwrap();
        assert_eq!(plugin.poll(&BTreeSet::new()).await.unwrap(), 1);

        plugin.stop().await.unwrap();
        let (second, mut second_events) = ChannelDuplexCallback::channel();
        plugin
            .start(TransportProperties::new(), remote, PluginConfig::new(), Arc::new(second))
            .await
            .unwrap();

        // The dial spawned before the stop completes during the new run
        gate.add_permits(1);
        listener.accept().await.unwrap();
        let stale = tokio::time::timeout(Duration::from_millis(200), second_events.recv()).await;
        assert!(stale.is_err(), "connection from the stopped run was delivered");
        assert!(first_events.try_recv().is_err());

        // A dial made in the new run is delivered
        assert_eq!(plugin.poll(&BTreeSet::new()).await.unwrap(), 1);
        gate.add_permits(1);
        listener.accept().await.unwrap();
        let event = tokio::time::timeout(Duration::from_secs(5), second_events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, DuplexEvent::Outgoing(c, _) if c == contact));

        plugin.stop().await.unwrap();
    }
}
