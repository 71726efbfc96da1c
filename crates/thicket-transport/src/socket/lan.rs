//! Direct TCP on the local network.

use std::{
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use async_trait::async_trait;
use thicket_crypto::TransportId;
use thicket_proto::DEFAULT_FRAME_LENGTH;
use tokio::net::TcpStream;

use super::{ADDRESS, PORT, SocketStrategy};
use crate::{
    control::PluginSnapshot,
    plugin::{Capabilities, Direction},
    properties::{ContactId, InvalidValue, TransportProperties},
};

/// Transport id of the LAN plugin
pub const LAN_TRANSPORT_ID: &str = "lan";

const POLLING_INTERVAL: Duration = Duration::from_secs(60);
const MAX_LATENCY: Duration = Duration::from_secs(30);

/// Listens on, and dials, plain `address`/`port` properties.
///
/// Without a local address the listener binds every interface; without a
/// local port the OS picks one, which is then written back to the local
/// properties for the application to publish.
#[derive(Debug, Clone)]
pub struct LanStrategy {
    id: TransportId,
}

impl Default for LanStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl LanStrategy {
    /// Strategy for the `"lan"` transport.
    pub fn new() -> Self {
        let Ok(id) = TransportId::new(LAN_TRANSPORT_ID) else {
            unreachable!("invariant: LAN transport id is within length bounds")
        };
        Self { id }
    }

    fn validate(properties: &TransportProperties) -> Result<(), InvalidValue> {
        properties.parse::<IpAddr>(ADDRESS)?;
        properties.parse::<u16>(PORT)?;
        Ok(())
    }
}

fn remote_address(properties: &TransportProperties) -> Option<SocketAddr> {
    let ip = properties.parse::<IpAddr>(ADDRESS).ok()??;
    let port = properties.parse::<u16>(PORT).ok()??;
    (port != 0).then_some(SocketAddr::new(ip, port))
}

#[async_trait]
impl SocketStrategy for LanStrategy {
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

    fn bind_address(&self, snapshot: &PluginSnapshot) -> Option<SocketAddr> {
        let local = &snapshot.local;
        let ip = local.parse::<IpAddr>(ADDRESS).ok().flatten();
        let port = local.parse::<u16>(PORT).ok().flatten();
        Some(SocketAddr::new(ip.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)), port.unwrap_or(0)))
    }

    fn record_bound(&self, local: &mut TransportProperties, bound: SocketAddr) {
        if !bound.ip().is_unspecified() {
            local.insert(ADDRESS, bound.ip().to_string());
        }
        local.insert(PORT, bound.port().to_string());
    }

    async fn connect(
        &self,
        snapshot: &PluginSnapshot,
        contact: ContactId,
    ) -> io::Result<Option<TcpStream>> {
        let Some(address) = snapshot.remote.get(&contact).and_then(remote_address) else {
            return Ok(None);
        };
        TcpStream::connect(address).await.map(Some)
    }
}
