use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::{debug, trace, warn};
use wire::{encode_ack_batch, encode_data_header, encode_meta, parse_frame, DataHeader, Frame, MetaHeader};

use crate::bitmap::ChunkBitmap;
use crate::channel::DatagramChannel;
use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::io::ChunkSource;

/// Allocates process-wide, monotonically increasing transfer ids starting
/// at zero, matching the reference sender's `static currTransferID`
/// counter. Receivers never persist or validate past ids, so wraparound is
/// not a practical concern; the field exists to let a future revision
/// multiplex transfers.
#[derive(Default)]
pub struct TransferIdAllocator(AtomicU64);

impl TransferIdAllocator {
    /// Returns a fresh allocator starting at zero.
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Returns the next transfer id, incrementing the counter.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// `ceil(file_size / chunk_size)`.
pub fn total_chunks_for(file_size: u64, chunk_size: u16) -> u32 {
    if file_size == 0 {
        return 0;
    }
    file_size.div_ceil(u64::from(chunk_size)) as u32
}

/// Builds the META header for a fresh transfer.
pub fn build_meta(transfer_id: u64, file_size: u64, chunk_size: u16, extension: &str) -> MetaHeader {
    MetaHeader {
        transfer_id,
        file_size,
        chunk_size,
        total_chunks: total_chunks_for(file_size, chunk_size),
        ext: MetaHeader::ext_from_str(extension),
    }
}

/// Drives the sliding-window send/retransmit loop for one transfer.
///
/// Generic over [`DatagramChannel`] (the sockets) and [`ChunkSource`] (the
/// input file), both of which the spec treats as external collaborators so
/// the window/retransmit logic here can be unit-tested against fakes.
pub struct SenderEngine<D, S> {
    data_channel: D,
    ack_channel: D,
    source: S,
    meta: MetaHeader,
    peer_data_addr: SocketAddr,
    config: TransferConfig,
    acked: ChunkBitmap,
    in_flight: HashMap<u32, Instant>,
    next_to_send: u32,
    done_count: u32,
}

impl<D, S> SenderEngine<D, S>
where
    D: DatagramChannel,
    S: ChunkSource,
{
    /// Creates a new engine for `meta`, targeting `peer_data_addr`.
    pub fn new(
        data_channel: D,
        ack_channel: D,
        source: S,
        meta: MetaHeader,
        peer_data_addr: SocketAddr,
        config: TransferConfig,
    ) -> Self {
        let acked = ChunkBitmap::new(meta.total_chunks);
        Self {
            data_channel,
            ack_channel,
            source,
            meta,
            peer_data_addr,
            config,
            acked,
            in_flight: HashMap::new(),
            next_to_send: 0,
            done_count: 0,
        }
    }

    /// Total number of chunks in this transfer.
    pub fn total_chunks(&self) -> u32 {
        self.meta.total_chunks
    }

    /// Number of chunks acknowledged so far.
    pub fn done_count(&self) -> u32 {
        self.done_count
    }

    /// Number of chunks currently awaiting acknowledgement.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Smallest chunk id never yet transmitted.
    pub fn next_to_send(&self) -> u32 {
        self.next_to_send
    }

    /// Whether every chunk has been acknowledged.
    pub fn is_done(&self) -> bool {
        self.done_count == self.meta.total_chunks
    }

    /// Sends the one META datagram for this transfer. Not retransmitted by
    /// the core if lost, per the spec.
    pub fn send_meta(&self) -> io::Result<()> {
        let bytes = encode_meta(&self.meta);
        self.data_channel.try_send_to(&bytes, self.peer_data_addr)?;
        Ok(())
    }

    /// Drains every ACK_BATCH currently pending on the ack socket, updating
    /// `acked`/`in_flight`/`done_count`. Calls `on_ack(done_count,
    /// total_chunks)` once per newly-acknowledged chunk id, in wire order,
    /// so callers can derive percent-complete progress exactly as the
    /// reference implementation does.
    pub fn drain_acks(&mut self, mut on_ack: impl FnMut(u32, u32)) {
        let mut buf = [0u8; 2048];
        loop {
            let (len, _from) = match self.ack_channel.try_recv_from(&mut buf) {
                Ok(pair) => pair,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    warn!(%err, "ack socket error, will retry next iteration");
                    break;
                }
            };
            let batch = match parse_frame(&buf[..len]) {
                Ok(Frame::AckBatch(batch)) => batch,
                Ok(other) => {
                    trace!(?other, "ignoring non-ack frame on ack socket");
                    continue;
                }
                Err(err) => {
                    trace!(%err, "dropping malformed ack datagram");
                    continue;
                }
            };
            if batch.transfer_id != self.meta.transfer_id {
                continue;
            }
            for id in batch.ids {
                if id >= self.meta.total_chunks {
                    continue;
                }
                if self.acked.set(id) {
                    self.done_count += 1;
                    self.in_flight.remove(&id);
                    on_ack(self.done_count, self.meta.total_chunks);
                }
            }
        }
    }

    fn read_chunk(&mut self, chunk_id: u32, payload: &mut [u8]) -> Result<usize, TransferError> {
        let offset = u64::from(chunk_id) * u64::from(self.meta.chunk_size);
        let got = self
            .source
            .read_at(offset, payload)
            .map_err(TransferError::InputReadFailed)?;
        if got == 0 {
            return Err(TransferError::InputReadFailed(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input file shorter than META advertised",
            )));
        }
        Ok(got)
    }

    fn send_chunk(&mut self, chunk_id: u32) -> Result<(), TransferError> {
        let mut payload = vec![0u8; self.meta.chunk_size as usize];
        let got = self.read_chunk(chunk_id, &mut payload)?;
        payload.truncate(got);
        let header = DataHeader {
            transfer_id: self.meta.transfer_id,
            chunk_id,
            payload_length: got as u16,
        };
        let header_bytes = encode_data_header(&header);
        let mut datagram = Vec::with_capacity(header_bytes.len() + payload.len());
        datagram.extend_from_slice(&header_bytes);
        datagram.extend_from_slice(&payload);
        if let Err(err) = self.data_channel.try_send_to(&datagram, self.peer_data_addr) {
            warn!(%err, chunk_id, "send failed, chunk stays in flight for retransmit");
        }
        Ok(())
    }

    /// Fills the window with previously-unsent chunks, bounded by
    /// `config.window`.
    pub fn fill_window(&mut self, now: Instant) -> Result<(), TransferError> {
        while self.in_flight.len() < self.config.window && self.next_to_send < self.meta.total_chunks {
            let chunk_id = self.next_to_send;
            self.send_chunk(chunk_id)?;
            self.in_flight.insert(chunk_id, now);
            self.next_to_send += 1;
        }
        Ok(())
    }

    /// Resends every in-flight chunk older than `config.rto`, updating its
    /// timestamp to `now`. Traversal order is unspecified, matching the
    /// spec's "all stale entries are considered in one pass". A fatal input
    /// read error aborts the retransmit pass and propagates, same as
    /// `fill_window`; a transient send failure is already absorbed inside
    /// `send_chunk`, so the chunk simply stays in flight for the next pass.
    pub fn retransmit_stale(&mut self, now: Instant) -> Result<(), TransferError> {
        let stale: Vec<u32> = self
            .in_flight
            .iter()
            .filter(|&(_, &sent_at)| now.saturating_duration_since(sent_at) > self.config.rto)
            .map(|(&id, _)| id)
            .collect();
        for chunk_id in stale {
            debug!(chunk_id, "retransmitting after RTO");
            self.send_chunk(chunk_id)?;
            self.in_flight.insert(chunk_id, now);
        }
        Ok(())
    }

    /// Drives the engine to completion: sends META once, then repeats
    /// ack-drain, window-fill, and retransmit until every chunk is
    /// acknowledged, yielding `config.poll_yield` between iterations.
    pub async fn run_to_completion(&mut self, mut on_ack: impl FnMut(u32, u32)) -> Result<(), TransferError> {
        self.send_meta()?;
        if self.is_done() {
            return Ok(());
        }
        while !self.is_done() {
            self.drain_acks(&mut on_ack);
            self.fill_window(Instant::now())?;
            self.retransmit_stale(Instant::now())?;
            tokio::time::sleep(self.config.poll_yield).await;
        }
        Ok(())
    }
}
