use std::io;
use std::net::SocketAddr;

/// The narrow slice of datagram-socket behaviour the transfer engines need:
/// non-blocking receive and non-blocking send. Everything else about the
/// underlying socket (binding, the broadcast option, address family) is the
/// spec's "datagram socket abstraction", deliberately out of the core's
/// scope and left to the caller that constructs one of these.
///
/// Implemented for [`tokio::net::UdpSocket`] for production use, and for an
/// in-memory fake (behind the `test-support` feature) so the sliding-window
/// and dedup logic can be exercised without a real network stack.
pub trait DatagramChannel: Send + Sync {
    /// Attempts to receive one datagram without blocking.
    ///
    /// Returns `Err` with [`io::ErrorKind::WouldBlock`] if none is pending.
    fn try_recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// Attempts to send one datagram to `target` without blocking.
    fn try_send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize>;
}

impl DatagramChannel for tokio::net::UdpSocket {
    fn try_recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        tokio::net::UdpSocket::try_recv_from(self, buf)
    }

    fn try_send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        tokio::net::UdpSocket::try_send_to(self, buf, target)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    //! An in-memory [`DatagramChannel`] pair for unit tests. Datagrams sent
    //! on one end become visible, in order, to the other end's
    //! `try_recv_from`, tagged with a fixed synthetic source address.

    use super::DatagramChannel;
    use std::collections::VecDeque;
    use std::io;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Inbox {
        queue: Mutex<VecDeque<(Vec<u8>, SocketAddr)>>,
    }

    /// One endpoint of an in-memory datagram pipe. Cheaply `Clone`: clones
    /// share the same underlying queues, so a test can keep a handle to
    /// inspect, drop, or reorder datagrams an engine is about to consume
    /// after moving the "real" endpoint into that engine.
    #[derive(Clone)]
    pub struct FakeChannel {
        own_addr: SocketAddr,
        inbox: Arc<Inbox>,
        peer_inbox: Arc<Inbox>,
    }

    /// Builds a connected pair of [`FakeChannel`]s, `a` and `b`, each
    /// addressed as given.
    pub fn pair(addr_a: SocketAddr, addr_b: SocketAddr) -> (FakeChannel, FakeChannel) {
        let inbox_a = Arc::new(Inbox::default());
        let inbox_b = Arc::new(Inbox::default());
        (
            FakeChannel {
                own_addr: addr_a,
                inbox: inbox_a.clone(),
                peer_inbox: inbox_b.clone(),
            },
            FakeChannel {
                own_addr: addr_b,
                inbox: inbox_b,
                peer_inbox: inbox_a,
            },
        )
    }

    impl FakeChannel {
        /// This channel's own address, as seen by its peer's `try_recv_from`.
        pub fn own_addr(&self) -> SocketAddr {
            self.own_addr
        }

        /// Discards the next datagram waiting in this channel's own inbox,
        /// simulating the loss of whatever the peer most recently sent.
        /// Returns whether there was one to discard.
        pub fn drop_next_incoming(&self) -> bool {
            self.inbox.queue.lock().unwrap().pop_front().is_some()
        }

        /// Injects a datagram directly into this channel's own inbox, as if
        /// it had arrived from `from`. Lets tests feed a hand-built frame to
        /// an engine without routing it through the peer side.
        pub fn inject(&self, datagram: Vec<u8>, from: SocketAddr) {
            self.inbox.queue.lock().unwrap().push_back((datagram, from));
        }
    }

    impl DatagramChannel for FakeChannel {
        fn try_recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            let mut queue = self.inbox.queue.lock().unwrap();
            match queue.pop_front() {
                Some((datagram, from)) => {
                    let n = datagram.len().min(buf.len());
                    buf[..n].copy_from_slice(&datagram[..n]);
                    Ok((n, from))
                }
                None => Err(io::Error::new(io::ErrorKind::WouldBlock, "no datagram pending")),
            }
        }

        fn try_send_to(&self, buf: &[u8], _target: SocketAddr) -> io::Result<usize> {
            self.peer_inbox
                .queue
                .lock()
                .unwrap()
                .push_back((buf.to_vec(), self.own_addr));
            Ok(buf.len())
        }
    }
}
