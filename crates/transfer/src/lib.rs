#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `transfer` implements the two halves of the reliable-delivery core: the
//! sender's sliding-window send/retransmit loop ([`sender::SenderEngine`])
//! and the receiver's duplicate-suppressing receive/ack loop
//! ([`receiver::ReceiverEngine`]). Both are generic over the narrow
//! [`channel::DatagramChannel`] and [`io::ChunkSource`]/[`io::ChunkSink`]
//! traits so they can be driven by real UDP sockets and files in the
//! binaries, or by in-memory fakes in tests.
//!
//! # Design
//!
//! Neither engine owns a concurrency model: they expose synchronous
//! step functions (`fill_window`, `drain_acks`, `retransmit_stale`,
//! `poll_once`) that a caller drives from whatever loop it prefers. The
//! binaries drive them from a `tokio` loop with an explicit `sleep` between
//! iterations, matching the spec's single cooperative event loop per peer.
//!
//! # Invariants
//!
//! - Sender: `acked[id] ⇒ id ∉ in_flight`; `|in_flight| ≤ WINDOW`;
//!   `next_to_send` is monotonically non-decreasing.
//! - Receiver: `received_count == popcount(received)`; `|pending_acks| ≤
//!   ack_flush_count` is not strictly enforced by a hard cap (the spec's
//!   256-id wire limit is enforced by [`wire::encode_ack_batch`] instead),
//!   but the default flush threshold keeps it there in practice.

pub mod bitmap;
pub mod channel;
pub mod config;
pub mod error;
pub mod io;
pub mod receiver;
pub mod sender;

pub use config::TransferConfig;
pub use error::TransferError;
pub use receiver::{ReceiveOutcome, ReceiverEngine, SinkFactory};
pub use sender::{build_meta, total_chunks_for, SenderEngine, TransferIdAllocator};
