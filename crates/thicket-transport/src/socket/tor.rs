//! TCP over Tor hidden services.
//!
//! Outgoing connections go through Tor's local SOCKS5 port to a contact's
//! onion address. Incoming connections arrive from the local Tor process,
//! which forwards the hidden service's virtual port to the port named in
//! the plugin config. Tor itself is managed by the application.

use std::{
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use async_trait::async_trait;
use thicket_crypto::TransportId;
use thicket_proto::DEFAULT_FRAME_LENGTH;
use tokio::net::TcpStream;

use super::{PORT, SocketStrategy, socks::socks5_connect};
use crate::{
    control::PluginSnapshot,
    plugin::{Capabilities, Direction},
    properties::{ContactId, InvalidValue, PluginConfig, TransportProperties},
};

/// Transport id of the Tor plugin
pub const TOR_TRANSPORT_ID: &str = "tor";

/// Property key holding an onion address, without the `.onion` suffix
pub const ONION: &str = "onion";

/// Virtual port every hidden service is published on
pub const HIDDEN_SERVICE_PORT: u16 = 80;

/// Tor's default SOCKS port
pub const DEFAULT_SOCKS_PORT: u16 = 9050;

const POLLING_INTERVAL: Duration = Duration::from_secs(3 * 60);
const MAX_LATENCY: Duration = Duration::from_secs(60);

/// Whether `onion` is a bare v2 (16 char) or v3 (56 char) onion address.
pub fn is_valid_onion(onion: &str) -> bool {
    matches!(onion.len(), 16 | 56)
        && onion.bytes().all(|b| b.is_ascii_lowercase() || (b'2'..=b'7').contains(&b))
}

/// Dials onion addresses through a SOCKS5 proxy.
#[derive(Debug, Clone)]
pub struct TorStrategy {
    id: TransportId,
    socks_proxy: SocketAddr,
}

impl Default for TorStrategy {
    fn default() -> Self {
        Self::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_SOCKS_PORT))
    }
}

impl TorStrategy {
    /// Strategy for the `"tor"` transport using the proxy at `socks_proxy`.
    pub fn new(socks_proxy: SocketAddr) -> Self {
        let Ok(id) = TransportId::new(TOR_TRANSPORT_ID) else {
            unreachable!("invariant: Tor transport id is within length bounds")
        };
        Self { id, socks_proxy }
    }

    /// Proxy outgoing connections go through.
    pub fn socks_proxy(&self) -> SocketAddr {
        self.socks_proxy
    }

    fn validate(properties: &TransportProperties) -> Result<(), InvalidValue> {
        properties.check(ONION, "a bare v2 or v3 onion address", is_valid_onion)
    }
}

#[async_trait]
impl SocketStrategy for TorStrategy {
    fn transport_id(&self) -> &TransportId {
        &self.id
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            direction: Direction::Duplex,
            polling_interval: Some(POLLING_INTERVAL),
            max_frame_length: DEFAULT_FRAME_LENGTH,
            max_latency: MAX_LATENCY,
        }
    }

    fn validate_local(&self, local: &TransportProperties) -> Result<(), InvalidValue> {
        Self::validate(local)
    }

    fn validate_remote(&self, remote: &TransportProperties) -> Result<(), InvalidValue> {
        Self::validate(remote)
    }

    fn validate_config(&self, config: &PluginConfig) -> Result<(), InvalidValue> {
        config.parse::<u16>(PORT).map(drop)
    }

    // Only the local Tor process should reach the forwarded port
    fn bind_address(&self, snapshot: &PluginSnapshot) -> Option<SocketAddr> {
        let port = snapshot.config.parse::<u16>(PORT).ok()??;
        Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port))
    }

    async fn connect(
        &self,
        snapshot: &PluginSnapshot,
        contact: ContactId,
    ) -> io::Result<Option<TcpStream>> {
        let Some(onion) = snapshot.remote.get(&contact).and_then(|p| p.get(ONION)) else {
            return Ok(None);
        };
        if !is_valid_onion(onion) {
            return Ok(None);
        }

        let mut stream = TcpStream::connect(self.socks_proxy).await?;
        socks5_connect(&mut stream, &format!("{onion}.onion"), HIDDEN_SERVICE_PORT).await?;
        Ok(Some(stream))
    }
}

#[cfg(test)]
mod tests {
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;

    const V2: &str = "expyuzz4wqqyqhjn";

    #[test]
    fn onion_format() {
        assert!(is_valid_onion(V2));
        assert!(is_valid_onion(&"a".repeat(56)));
        assert!(!is_valid_onion("expyuzz4wqqyqhjn.onion"));
        assert!(!is_valid_onion("EXPYUZZ4WQQYQHJN"));
        assert!(!is_valid_onion("expyuzz4wqqyqhj1"));
        assert!(!is_valid_onion(""));
    }

    #[test]
    fn listens_on_loopback_config_port() {
        let strategy = TorStrategy::default();
        assert_eq!(strategy.bind_address(&PluginSnapshot::default()), None);

        let snapshot = PluginSnapshot {
            config: PluginConfig::new().with(PORT, "59050"),
            ..PluginSnapshot::default()
        };
        assert_eq!(strategy.bind_address(&snapshot), Some("127.0.0.1:59050".parse().unwrap()));
    }

    #[test]
    fn rejects_bad_config_port() {
        let strategy = TorStrategy::default();
        let config = PluginConfig::new().with(PORT, "99999");
        assert_eq!(strategy.validate_config(&config).unwrap_err().key, PORT);
    }

    #[tokio::test]
    async fn dials_onion_through_proxy() {
        let proxy = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let strategy = TorStrategy::new(proxy.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut socket, _) = proxy.accept().await.unwrap();
            let mut greeting = [0u8; 3];
            socket.read_exact(&mut greeting).await.unwrap();
            socket.write_all(&[0x05, 0x00]).await.unwrap();

            let mut header = [0u8; 5];
            socket.read_exact(&mut header).await.unwrap();
            let mut host = vec![0u8; usize::from(header[4])];
            socket.read_exact(&mut host).await.unwrap();
            let port = socket.read_u16().await.unwrap();
            socket.write_all(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0]).await.unwrap();
            (String::from_utf8(host).unwrap(), port)
        });

        let mut remote = crate::properties::RemoteProperties::new();
        remote.insert(ContactId::new(3), TransportProperties::new().with(ONION, V2));
        let snapshot = PluginSnapshot { remote, ..PluginSnapshot::default() };

        let stream = strategy.connect(&snapshot, ContactId::new(3)).await.unwrap();
        assert!(stream.is_some());
        assert_eq!(server.await.unwrap(), (format!("{V2}.onion"), HIDDEN_SERVICE_PORT));
    }

    #[tokio::test]
    async fn contact_without_onion_is_none() {
        let strategy = TorStrategy::default();
        let stream = strategy.connect(&PluginSnapshot::default(), ContactId::new(3)).await.unwrap();
        assert!(stream.is_none());
    }
}
