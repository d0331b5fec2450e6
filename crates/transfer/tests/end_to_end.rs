//! Wires a [`SenderEngine`] and a [`ReceiverEngine`] together over the
//! in-memory fake channel/sink pair and drives both manually, exercising the
//! end-to-end scenarios enumerated alongside the protocol's testable
//! properties: lossless small transfers, ack loss + retransmit, reordered
//! delivery, duplicate data, and wrong-peer rejection.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use transfer::channel::fake::{pair, FakeChannel};
use transfer::channel::DatagramChannel;
use transfer::config::TransferConfig;
use transfer::io::fake::{MemorySink, MemorySource};
use transfer::sender::build_meta;
use transfer::{ReceiveOutcome, ReceiverEngine, SenderEngine, SinkFactory};
use wire::MetaHeader;

#[derive(Default)]
struct SingleSinkFactory;

impl SinkFactory<MemorySink> for SingleSinkFactory {
    fn open(&mut self, _meta: &MetaHeader) -> std::io::Result<MemorySink> {
        Ok(MemorySink::default())
    }
}

fn addrs() -> (SocketAddr, SocketAddr) {
    (
        "127.0.0.1:40001".parse().unwrap(), // sender's data-channel address
        "127.0.0.1:50000".parse().unwrap(), // receiver's data-channel address
    )
}

/// Builds a connected sender/receiver pair plus a clone of each channel's
/// "wire" so the test can observe, drop, or reorder datagrams in flight
/// without reaching into either engine's private fields.
struct Harness {
    sender: SenderEngine<FakeChannel, MemorySource>,
    receiver: ReceiverEngine<FakeChannel, MemorySink, SingleSinkFactory>,
    /// Shares the queue the receiver's data channel reads from.
    data_wire: FakeChannel,
    /// Shares the queue the sender's ack channel reads from.
    ack_wire: FakeChannel,
}

fn harness_with_configs(
    data: &'static str,
    chunk_size: u16,
    chosen_peer: Option<SocketAddr>,
    sender_config: TransferConfig,
    receiver_config: TransferConfig,
) -> Harness {
    let (sender_addr, receiver_addr) = addrs();
    let (sender_data, receiver_data) = pair(sender_addr, receiver_addr);
    let (receiver_ack, sender_ack) = pair(receiver_addr, sender_addr);

    let data_wire = receiver_data.clone();
    let ack_wire = sender_ack.clone();

    let meta = build_meta(0, data.len() as u64, chunk_size, "bin");
    let sender = SenderEngine::new(
        sender_data,
        sender_ack,
        MemorySource::new(data.as_bytes().to_vec()),
        meta,
        receiver_addr,
        sender_config,
    );
    let receiver = ReceiverEngine::new(
        receiver_data,
        receiver_ack,
        SingleSinkFactory,
        receiver_config,
        chosen_peer,
    );
    Harness {
        sender,
        receiver,
        data_wire,
        ack_wire,
    }
}

fn harness(data: &'static str, chunk_size: u16, chosen_peer: Option<SocketAddr>) -> Harness {
    harness_with_configs(
        data,
        chunk_size,
        chosen_peer,
        TransferConfig::default(),
        TransferConfig::default(),
    )
}

#[test]
fn tiny_file_transfers_losslessly_end_to_end() {
    let Harness {
        mut sender,
        mut receiver,
        ..
    } = harness("aevin", 1200, None);
    sender.send_meta().unwrap();

    assert_eq!(
        receiver.poll_once(Instant::now()).unwrap(),
        ReceiveOutcome::MetaAccepted { total_chunks: 1 }
    );

    sender.fill_window(Instant::now()).unwrap();
    assert_eq!(sender.next_to_send(), 1);

    assert_eq!(
        receiver.poll_once(Instant::now()).unwrap(),
        ReceiveOutcome::TransferComplete
    );

    let mut acked = Vec::new();
    sender.drain_acks(|done, total| acked.push((done, total)));
    assert_eq!(acked, vec![(1, 1)]);
    assert!(sender.is_done());
}

/// Reproduces the spec's "two-chunk file, ack loss" scenario with a third
/// chunk added so the lost ack belongs to a chunk that is not the one whose
/// receipt completes the transfer: a window of 1 serializes transmission so
/// the timeline is deterministic, and an immediate ack-flush threshold on
/// the receiver means every accepted chunk produces exactly one ACK_BATCH.
#[test]
fn ack_loss_is_recovered_by_rto_driven_retransmit() {
    let sender_config = TransferConfig {
        window: 1,
        rto: Duration::from_millis(50),
        ..TransferConfig::default()
    };
    let receiver_config = TransferConfig {
        ack_flush_count: 1,
        ..TransferConfig::default()
    };
    let mut harness = harness_with_configs(
        &"x".repeat(3),
        1,
        None,
        sender_config,
        receiver_config,
    );
    harness.sender.send_meta().unwrap();
    harness.receiver.poll_once(Instant::now()).unwrap(); // META

    let mut now = Instant::now();
    harness.sender.fill_window(now).unwrap();
    assert_eq!(harness.sender.next_to_send(), 1); // window=1 caps at chunk 0

    // Chunk 0 is delivered and immediately acked...
    assert_eq!(
        harness.receiver.poll_once(now).unwrap(),
        ReceiveOutcome::ChunkWritten { chunk_id: 0 }
    );
    // ...but that ack is lost on the wire.
    assert!(harness.ack_wire.drop_next_incoming());

    harness.sender.drain_acks(|_, _| panic!("the only ack was dropped"));
    assert_eq!(harness.sender.done_count(), 0);
    // The window stays full of the unacked chunk, so no new chunk is sent.
    harness.sender.fill_window(now).unwrap();
    assert_eq!(harness.sender.next_to_send(), 1);

    // RTO elapses; the sender resends chunk 0.
    now += Duration::from_millis(60);
    harness.sender.retransmit_stale(now).unwrap();

    // This redelivery is a duplicate, but the receiver re-acks it anyway,
    // and this time the ack reaches the sender.
    assert_eq!(
        harness.receiver.poll_once(now).unwrap(),
        ReceiveOutcome::DuplicateChunk { chunk_id: 0 }
    );
    let mut acked = Vec::new();
    harness.sender.drain_acks(|done, total| acked.push((done, total)));
    assert_eq!(acked, vec![(1, 3)]);

    // With chunk 0 acked, the window opens up and the remaining chunks flow
    // through normally.
    for chunk_id in 1..3u32 {
        harness.sender.fill_window(now).unwrap();
        assert_eq!(harness.sender.next_to_send(), chunk_id + 1);
        harness.receiver.poll_once(now).unwrap();
        harness.sender.drain_acks(|done, total| acked.push((done, total)));
    }

    assert!(harness.sender.is_done());
    assert_eq!(harness.sender.done_count(), 3);
    assert_eq!(acked.last(), Some(&(3, 3)));
}

#[test]
fn reordered_delivery_lands_each_chunk_at_the_correct_offset() {
    let mut harness = harness("abcdef", 2, None);
    harness.sender.send_meta().unwrap();
    harness.receiver.poll_once(Instant::now()).unwrap();

    harness.sender.fill_window(Instant::now()).unwrap();
    assert_eq!(harness.sender.next_to_send(), 3);

    // Drain the three queued DATA datagrams, then re-inject them in reverse
    // order so the receiver sees chunk 2 first, then 1, then 0.
    let mut buf = [0u8; 64];
    let mut datagrams = Vec::new();
    while let Ok((len, from)) = harness.data_wire.try_recv_from(&mut buf) {
        datagrams.push((buf[..len].to_vec(), from));
    }
    assert_eq!(datagrams.len(), 3);
    for (datagram, from) in datagrams.into_iter().rev() {
        harness.data_wire.inject(datagram, from);
        harness.receiver.poll_once(Instant::now()).unwrap();
    }

    assert_eq!(harness.receiver.received_count(), 3);
}

#[test]
fn duplicate_data_is_written_once_but_acked_every_delivery() {
    let mut harness = harness("hi", 2, None);
    harness.sender.send_meta().unwrap();
    harness.receiver.poll_once(Instant::now()).unwrap();

    harness.sender.fill_window(Instant::now()).unwrap();

    let mut buf = [0u8; 64];
    let (len, from) = harness.data_wire.try_recv_from(&mut buf).unwrap();
    let datagram = buf[..len].to_vec();

    for _ in 0..3 {
        harness.data_wire.inject(datagram.clone(), from);
        harness.receiver.poll_once(Instant::now()).unwrap();
    }
    assert_eq!(harness.receiver.received_count(), 1);
}

#[test]
fn data_from_a_different_peer_than_chosen_is_dropped() {
    let bound: SocketAddr = "10.1.1.1:1".parse().unwrap();
    let mut harness = harness("hi", 2, Some(bound));
    harness.sender.send_meta().unwrap();
    // META itself is from the sender's address (not `bound`), so it too is
    // dropped: no transfer is ever installed.
    let outcome = harness.receiver.poll_once(Instant::now()).unwrap();
    assert_eq!(outcome, ReceiveOutcome::Dropped);
    assert!(!harness.receiver.has_transfer());
}

#[test]
fn empty_file_completes_without_any_data_frame() {
    let mut harness = harness("", 1200, None);
    harness.sender.send_meta().unwrap();
    assert_eq!(harness.sender.total_chunks(), 0);
    assert!(harness.sender.is_done());

    let outcome = harness.receiver.poll_once(Instant::now()).unwrap();
    assert_eq!(outcome, ReceiveOutcome::TransferComplete);
}
