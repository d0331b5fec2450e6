use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::time::Instant;

use tracing::{debug, info, trace, warn};
use wire::{encode_ack_batch, parse_frame, DataHeader, Frame, MetaHeader};

use crate::bitmap::ChunkBitmap;
use crate::channel::DatagramChannel;
use crate::config::TransferConfig;
use crate::io::ChunkSink;

/// One accepted transfer's receive-side state: the fields the spec lists
/// under "Transfer state (receiver)", minus `output`/`chosen_peer_addr`,
/// which live on [`ReceiverEngine`] since they outlive any single transfer.
struct ActiveTransfer<K> {
    transfer_id: u64,
    chunk_size: u16,
    total_chunks: u32,
    received: ChunkBitmap,
    received_count: u32,
    output: K,
    pending_acks: VecDeque<u32>,
    last_ack_flush: Instant,
    last_data_from: Option<SocketAddr>,
}

impl<K> ActiveTransfer<K> {
    fn is_complete(&self) -> bool {
        self.received_count == self.total_chunks
    }
}

/// Builds the output sink for a newly-accepted META. Out of the core's
/// scope per the spec (`received_file.<ext>`, opened binary+truncate); the
/// engine is generic over [`ChunkSink`] so this can be a real file in the
/// binary and an in-memory buffer in tests.
pub trait SinkFactory<K: ChunkSink> {
    /// Creates (or truncates) the sink that should receive `meta`'s chunks.
    fn open(&mut self, meta: &MetaHeader) -> io::Result<K>;
}

/// Drives the receiver's **Transfer** state: accepts META to open a sink and
/// allocate the delivery bitmap, accepts DATA to write de-duplicated
/// payloads, and flushes batched ACK_BATCH frames back to the sender.
///
/// Discovery's **Discover** state (replying `HERE`, recording `CHOSEN`) is
/// handled entirely by `discovery::receiver` before this engine is built;
/// `chosen_peer_addr` is threaded in at construction time.
pub struct ReceiverEngine<D, K, F> {
    data_channel: D,
    ack_channel: D,
    sink_factory: F,
    config: TransferConfig,
    chosen_peer_addr: Option<SocketAddr>,
    current: Option<ActiveTransfer<K>>,
}

/// What happened to one accepted datagram, surfaced to the caller so a
/// binary can print progress or a test can assert on outcomes without
/// reaching into private engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// A META frame installed a new transfer.
    MetaAccepted { total_chunks: u32 },
    /// A META frame could not be installed (sink could not be opened).
    MetaRejected,
    /// A DATA frame was written for the first time.
    ChunkWritten { chunk_id: u32 },
    /// A DATA frame repeated a chunk already written; re-acked, not rewritten.
    DuplicateChunk { chunk_id: u32 },
    /// The datagram was dropped per one of the spec's drop rules.
    Dropped,
    /// This DATA/META completed the transfer (`received_count == total_chunks`).
    TransferComplete,
}

impl<D, K, F> ReceiverEngine<D, K, F>
where
    D: DatagramChannel,
    K: ChunkSink,
    F: SinkFactory<K>,
{
    /// Creates a new engine. `chosen_peer_addr` is `Some` once `CHOSEN` has
    /// been recorded by the discovery handshake; META/DATA from any other
    /// address is dropped per the spec. Only the IP is compared, not the
    /// port: the sender's discovery, data, and ack traffic each originate
    /// from a different local port, so `chosen_peer_addr` (recorded from
    /// `CHOSEN`, arriving on the discovery socket) never shares a port with
    /// the data socket's source address.
    pub fn new(
        data_channel: D,
        ack_channel: D,
        sink_factory: F,
        config: TransferConfig,
        chosen_peer_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            data_channel,
            ack_channel,
            sink_factory,
            config,
            chosen_peer_addr,
            current: None,
        }
    }

    /// Number of chunks received so far in the current transfer, or `0` if
    /// none is installed.
    pub fn received_count(&self) -> u32 {
        self.current.as_ref().map_or(0, |t| t.received_count)
    }

    /// Total chunks of the current transfer, or `0` if none is installed.
    pub fn total_chunks(&self) -> u32 {
        self.current.as_ref().map_or(0, |t| t.total_chunks)
    }

    /// Whether a transfer is currently installed.
    pub fn has_transfer(&self) -> bool {
        self.current.is_some()
    }

    fn accept_meta(&mut self, meta: MetaHeader, from: SocketAddr, now: Instant) -> ReceiveOutcome {
        if let Some(bound) = self.chosen_peer_addr {
            if bound.ip() != from.ip() {
                trace!(%from, %bound, "dropping META from non-bound peer");
                return ReceiveOutcome::Dropped;
            }
        }
        let sink = match self.sink_factory.open(&meta) {
            Ok(sink) => sink,
            Err(err) => {
                warn!(%err, "could not open output sink, discarding META");
                return ReceiveOutcome::MetaRejected;
            }
        };
        info!(
            transfer_id = meta.transfer_id,
            total_chunks = meta.total_chunks,
            file_size = meta.file_size,
            "installed new transfer, replacing any prior one"
        );
        self.current = Some(ActiveTransfer {
            transfer_id: meta.transfer_id,
            chunk_size: meta.chunk_size,
            total_chunks: meta.total_chunks,
            received: ChunkBitmap::new(meta.total_chunks),
            received_count: 0,
            output: sink,
            pending_acks: VecDeque::new(),
            last_ack_flush: now,
            last_data_from: None,
        });
        ReceiveOutcome::MetaAccepted {
            total_chunks: meta.total_chunks,
        }
    }

    fn accept_data(
        &mut self,
        header: DataHeader,
        payload: &[u8],
        datagram_len: usize,
        from: SocketAddr,
    ) -> ReceiveOutcome {
        if let Some(bound) = self.chosen_peer_addr {
            if bound.ip() != from.ip() {
                trace!(%from, %bound, "dropping DATA from non-bound peer");
                return ReceiveOutcome::Dropped;
            }
        }
        let Some(transfer) = self.current.as_mut() else {
            trace!("dropping DATA: no transfer installed");
            return ReceiveOutcome::Dropped;
        };
        if header.transfer_id != transfer.transfer_id {
            trace!(
                got = header.transfer_id,
                want = transfer.transfer_id,
                "dropping DATA: transfer id mismatch"
            );
            return ReceiveOutcome::Dropped;
        }
        if header.chunk_id >= transfer.total_chunks {
            trace!(
                chunk_id = header.chunk_id,
                total_chunks = transfer.total_chunks,
                "dropping DATA: chunk id out of range"
            );
            return ReceiveOutcome::Dropped;
        }
        let needed = wire::DATA_HEADER_LEN + header.payload_length as usize;
        if needed > datagram_len {
            trace!(
                chunk_id = header.chunk_id,
                declared = header.payload_length,
                datagram_len,
                "dropping DATA: declared payload longer than datagram"
            );
            return ReceiveOutcome::Dropped;
        }

        transfer.last_data_from = Some(from);
        let chunk_id = header.chunk_id;
        let outcome = if transfer.received.get(chunk_id) {
            trace!(chunk_id, "duplicate chunk, re-acking without rewrite");
            ReceiveOutcome::DuplicateChunk { chunk_id }
        } else {
            let offset = u64::from(chunk_id) * u64::from(transfer.chunk_size);
            if let Err(err) = transfer.output.write_at(offset, payload) {
                warn!(%err, chunk_id, "failed to write chunk, will retry on retransmit");
                return ReceiveOutcome::Dropped;
            }
            transfer.received.set(chunk_id);
            transfer.received_count += 1;
            debug!(
                chunk_id,
                received_count = transfer.received_count,
                total_chunks = transfer.total_chunks,
                "wrote chunk"
            );
            ReceiveOutcome::ChunkWritten { chunk_id }
        };
        enqueue_ack(transfer, chunk_id);
        outcome
    }

    /// Reads and handles exactly one pending datagram across the data
    /// socket, flushes acks per the predicate, and returns what happened.
    /// Returns `Err(WouldBlock)` when no datagram is pending.
    pub fn poll_once(&mut self, now: Instant) -> io::Result<ReceiveOutcome> {
        let mut buf = [0u8; 2048];
        let (len, from) = self.data_channel.try_recv_from(&mut buf)?;
        let outcome = match parse_frame(&buf[..len]) {
            Ok(Frame::Meta(meta)) => self.accept_meta(meta, from, now),
            Ok(Frame::Data { header, payload }) => self.accept_data(header, &payload, len, from),
            Ok(Frame::AckBatch(_)) => {
                trace!("dropping ACK_BATCH seen on data socket");
                ReceiveOutcome::Dropped
            }
            Err(err) => {
                trace!(%err, "dropping malformed datagram on data socket");
                ReceiveOutcome::Dropped
            }
        };

        self.maybe_flush_acks(now, false);
        if self.current.as_ref().is_some_and(ActiveTransfer::is_complete) {
            self.finish_transfer(now);
            return Ok(ReceiveOutcome::TransferComplete);
        }
        Ok(outcome)
    }

    /// Checks the flush predicate (`|pending_acks| >= ack_flush_count` or
    /// `now - last_ack_flush >= ack_flush_interval`) and, if satisfied (or
    /// `force`), emits one ACK_BATCH to the endpoint of the most recent
    /// DATA sender. Returns whether a flush happened.
    fn maybe_flush_acks(&mut self, now: Instant, force: bool) -> bool {
        let Some(transfer) = self.current.as_mut() else {
            return false;
        };
        if transfer.pending_acks.is_empty() {
            return false;
        }
        let due = transfer.pending_acks.len() >= self.config.ack_flush_count
            || now.saturating_duration_since(transfer.last_ack_flush) >= self.config.ack_flush_interval;
        if !(due || force) {
            return false;
        }
        let Some(dest) = transfer.last_data_from else {
            return false;
        };
        let ids: Vec<u32> = transfer.pending_acks.drain(..).collect();
        match encode_ack_batch(transfer.transfer_id, &ids) {
            Ok(bytes) => {
                let ack_dest = SocketAddr::new(dest.ip(), self.config.ack_port);
                if let Err(err) = self.ack_channel.try_send_to(&bytes, ack_dest) {
                    warn!(%err, "failed to send ACK_BATCH");
                } else {
                    debug!(count = ids.len(), "flushed ACK_BATCH");
                }
            }
            Err(err) => warn!(%err, "failed to encode ACK_BATCH"),
        }
        transfer.last_ack_flush = now;
        true
    }

    fn finish_transfer(&mut self, now: Instant) {
        self.maybe_flush_acks(now, true);
        if let Some(mut transfer) = self.current.take() {
            if let Err(err) = transfer.output.flush() {
                warn!(%err, "failed to flush output on completion");
            }
            info!(
                transfer_id = transfer.transfer_id,
                total_chunks = transfer.total_chunks,
                "transfer complete"
            );
        }
    }
}

fn enqueue_ack<K>(transfer: &mut ActiveTransfer<K>, chunk_id: u32) {
    transfer.pending_acks.push_back(chunk_id);
}
