//! Minimal SOCKS5 client (RFC 1928): no authentication, CONNECT by
//! domain name so the proxy resolves the destination.
//!
//! ```text
//! ──► [05 01 00]                        greeting, "no auth" only
//! ◄── [05 00]
//! ──► [05 01 00 03 len host.. port]     CONNECT host:port
//! ◄── [05 rep 00 atyp addr.. port]      rep 00 = success
//! ```

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const VERSION: u8 = 0x05;
const NO_AUTH: u8 = 0x00;
const CONNECT: u8 = 0x01;
const RESERVED: u8 = 0x00;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;
const SUCCEEDED: u8 = 0x00;

fn protocol_error(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

fn reply_message(code: u8) -> &'static str {
    match code {
        0x01 => "general SOCKS server failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unknown SOCKS reply",
    }
}

/// Ask the proxy on `stream` to connect to `host:port`.
///
/// On success the stream carries the tunnelled connection.
///
/// # Errors
///
/// - `InvalidInput` if `host` is empty or longer than 255 bytes
/// - `InvalidData` if the proxy speaks another protocol or version
/// - `ConnectionRefused` if the proxy reports any failure
pub async fn socks5_connect<S>(stream: &mut S, host: &str, port: u16) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Ok(host_length) = u8::try_from(host.len()) else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "host name longer than 255 bytes"));
    };
    if host_length == 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty host name"));
    }

    stream.write_all(&[VERSION, 1, NO_AUTH]).await?;
    stream.flush().await?;

    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await?;
    if choice != [VERSION, NO_AUTH] {
        return Err(protocol_error(format!("proxy refused no-auth method: {choice:02x?}")));
    }

    let mut request = Vec::with_capacity(7 + host.len());
    request.extend_from_slice(&[VERSION, CONNECT, RESERVED, ATYP_DOMAIN, host_length]);
    request.extend_from_slice(host.as_bytes());
    request.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&request).await?;
    stream.flush().await?;

    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply).await?;
    if reply[0] != VERSION {
        return Err(protocol_error(format!("unexpected SOCKS version {:#04x}", reply[0])));
    }
    if reply[1] != SUCCEEDED {
        return Err(io::Error::new(io::ErrorKind::ConnectionRefused, reply_message(reply[1])));
    }

    // Bound address is meaningless through Tor but must be consumed
    let address_length = match reply[3] {
        ATYP_IPV4 => 4,
        ATYP_IPV6 => 16,
        ATYP_DOMAIN => usize::from(stream.read_u8().await?),
        other => return Err(protocol_error(format!("unknown address type {other:#04x}"))),
    };
    let mut bound = vec![0u8; address_length + 2];
    stream.read_exact(&mut bound).await?;
    Ok(())
}
