#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `discovery` implements the three-message handshake that binds a transfer
//! to exactly one peer address: the sender broadcasts `DISCOVER`, every
//! listening receiver replies unicast with `HERE <name> <data-port>`, and the
//! sender picks one and sends it `CHOSEN`.
//!
//! # Design
//!
//! [`sender::discover_receivers`] drives the sender side and
//! [`receiver::respond_until_chosen`] drives the receiver side. Both run on
//! plain `tokio::net::UdpSocket`s; the sender bounds its wait with
//! `tokio::time::timeout` rather than a manual non-blocking poll loop, and
//! the receiver simply awaits its next datagram, since both are in the
//! spec's "blocking receive" phase rather than the transfer phase's
//! non-blocking one.
//!
//! # Invariants
//!
//! - The sender's discovered set never contains two entries with the same
//!   `(ip, data_port)` pair.
//! - `CHOSEN` is sent at most once per transfer attempt.
//! - Malformed or out-of-range `HERE` replies are silently ignored, never
//!   surfaced as errors.

pub mod config;
pub mod receiver;
pub mod sender;
mod wire_text;

use thiserror::Error;

pub use config::DiscoveryConfig;
pub use sender::DiscoveredDevice;
pub use wire_text::{parse_here_reply, CHOSEN_MSG, DISCOVER_MSG};

/// Errors raised by the discovery handshake.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A socket operation failed for a reason other than would-block.
    #[error("discovery socket error: {0}")]
    Io(#[from] std::io::Error),
    /// The discovery window closed without a single `HERE` reply.
    #[error("no receivers discovered")]
    NoReceiversDiscovered,
}

/// The IPv4 limited-broadcast address (`255.255.255.255`) on `port`, the
/// usual target for `DISCOVER` on a single broadcast domain.
pub fn limited_broadcast_addr(port: u16) -> std::net::SocketAddr {
    std::net::SocketAddr::new(std::net::Ipv4Addr::BROADCAST.into(), port)
}
