use std::collections::HashSet;
use std::io;
use std::net::{IpAddr, SocketAddr};

use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{trace, warn};

use crate::config::DiscoveryConfig;
use crate::wire_text::{parse_here_reply, CHOSEN_MSG, DISCOVER_MSG};
use crate::DiscoveryError;

/// One receiver that replied to a `DISCOVER` broadcast.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// The non-whitespace token the receiver advertised as its name.
    pub name: String,
    /// IP address the `HERE` reply arrived from.
    pub ip: IpAddr,
    /// Data-channel port the receiver advertised inside its reply.
    pub data_port: u16,
}

impl DiscoveredDevice {
    /// The endpoint META/DATA frames for a chosen transfer should target.
    pub fn data_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.data_port)
    }

    /// The endpoint `CHOSEN` should be sent to: same host, discovery port.
    pub fn discovery_addr(&self, discovery_port: u16) -> SocketAddr {
        SocketAddr::new(self.ip, discovery_port)
    }
}

/// Broadcasts `DISCOVER` to `broadcast_addr` and collects `HERE` replies for
/// `config.window`, de-duplicating by `(ip, advertised data port)` and
/// preserving arrival order.
///
/// `socket` must already have the broadcast option enabled (the socket
/// abstraction itself is outside the core per the spec).
pub async fn discover_receivers(
    socket: &UdpSocket,
    broadcast_addr: SocketAddr,
    config: &DiscoveryConfig,
) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
    socket
        .send_to(DISCOVER_MSG.as_bytes(), broadcast_addr)
        .await
        .map_err(DiscoveryError::Io)?;

    let mut devices = Vec::new();
    let mut seen = HashSet::new();
    let deadline = Instant::now() + config.window;
    let mut buf = [0u8; 512];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, from))) => {
                let Some((name, port)) = parse_here_reply(&buf[..len]) else {
                    trace!(?from, "ignoring malformed discovery reply");
                    continue;
                };
                let key = (from.ip(), port);
                if seen.insert(key) {
                    devices.push(DiscoveredDevice {
                        name,
                        ip: from.ip(),
                        data_port: port,
                    });
                }
            }
            Ok(Err(err)) => {
                warn!(%err, "discovery socket error, continuing to listen");
            }
            Err(_elapsed) => break,
        }
    }

    Ok(devices)
}

/// Sends the literal `CHOSEN` payload to `device`'s discovery endpoint,
/// binding the transfer to it from the receiver's perspective.
pub async fn send_chosen(
    socket: &UdpSocket,
    device: &DiscoveredDevice,
    discovery_port: u16,
) -> io::Result<()> {
    socket
        .send_to(CHOSEN_MSG.as_bytes(), device.discovery_addr(discovery_port))
        .await
        .map(|_| ())
}
