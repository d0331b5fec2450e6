use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::wire_text::{CHOSEN_MSG, DISCOVER_MSG};

/// Runs the receiver side of the discovery handshake: replies `HERE <name>
/// <data_port>` to every `DISCOVER`, and returns the source address of the
/// first `CHOSEN` it sees. Any other payload is ignored.
///
/// This is the **Discover** state of the receiver's state machine; the
/// caller transitions into **Transfer** using the returned address as
/// `chosen_peer_addr`.
pub async fn respond_until_chosen(
    socket: &UdpSocket,
    name: &str,
    data_port: u16,
) -> io::Result<SocketAddr> {
    let reply = format!("HERE {name} {data_port}");
    let mut buf = [0u8; 512];
    loop {
        let (len, from) = socket.recv_from(&mut buf).await?;
        let msg = &buf[..len];
        if msg == DISCOVER_MSG.as_bytes() {
            debug!(%from, "replying to discovery probe");
            socket.send_to(reply.as_bytes(), from).await?;
        } else if msg == CHOSEN_MSG.as_bytes() {
            info!(%from, "bound transfer to chosen peer");
            return Ok(from);
        }
    }
}
