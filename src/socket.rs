//! Per-socket endpoint identity and receive queue.

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::datagram::Datagram;

/// Default cap on the total bytes a single socket's receive queue may hold.
pub const DEFAULT_RECV_QUEUE_CAP_BYTES: usize = 10 * 1024 * 1024;

/// The socket's position in its lifecycle: `fresh` (just created) moves to
/// either `bound` or `connected`, either of which can terminate in
/// `released`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Fresh,
    Bound,
    Connected,
    Released,
}

/// A cached route to a connected peer, reused across `sendmsg` calls. Opaque
/// to the core: its contents come entirely from the
/// [`crate::transport::Transport`] collaborator.
#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub daddr: Ipv4Addr,
}

/// A Swift socket: bound/connected endpoint identity plus a bounded FIFO of
/// delivered datagrams.
///
/// The receive side is a plain bounded queue behind a [`parking_lot::Mutex`]
/// rather than an mpsc channel, because `recvmsg` needs to peek/drain several
/// queued entries in one call, which an mpsc receiver cannot do.
pub struct Socket {
    pub id: u64,
    state: Mutex<SocketState>,

    src: AtomicU8Cell,
    dst: AtomicU8Cell,
    daddr: Mutex<Ipv4Addr>,

    queue: Mutex<VecDeque<Datagram>>,
    queue_bytes: AtomicUsize,
    queue_cap_bytes: usize,
    notify: Notify,

    cached_route: Mutex<Option<Route>>,
}

/// A tiny `Cell`-like wrapper so `src`/`dst` can be read without locking the
/// whole socket; both fields are single-writer, set once at bind/connect
/// time and immutable thereafter until release.
struct AtomicU8Cell(std::sync::atomic::AtomicU8);

impl AtomicU8Cell {
    fn new(v: u8) -> Self {
        Self(std::sync::atomic::AtomicU8::new(v))
    }

    fn get(&self) -> u8 {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, v: u8) {
        self.0.store(v, Ordering::Release)
    }
}

impl Socket {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            state: Mutex::new(SocketState::Fresh),
            src: AtomicU8Cell::new(0),
            dst: AtomicU8Cell::new(0),
            daddr: Mutex::new(Ipv4Addr::UNSPECIFIED),
            queue: Mutex::new(VecDeque::new()),
            queue_bytes: AtomicUsize::new(0),
            queue_cap_bytes: DEFAULT_RECV_QUEUE_CAP_BYTES,
            notify: Notify::new(),
            cached_route: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SocketState {
        *self.state.lock()
    }

    pub fn src(&self) -> u8 {
        self.src.get()
    }

    pub fn dst(&self) -> u8 {
        self.dst.get()
    }

    pub fn daddr(&self) -> Ipv4Addr {
        *self.daddr.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.dst.get() != 0
    }

    pub(crate) fn mark_bound(&self, src: u8) {
        self.src.set(src);
        *self.state.lock() = SocketState::Bound;
    }

    pub(crate) fn mark_connected(&self, src: u8, dst: u8, daddr: Ipv4Addr) {
        self.src.set(src);
        self.dst.set(dst);
        *self.daddr.lock() = daddr;
        *self.state.lock() = SocketState::Connected;
    }

    pub(crate) fn mark_released(&self) {
        *self.state.lock() = SocketState::Released;
    }

    pub fn cached_route(&self) -> Option<Route> {
        *self.cached_route.lock()
    }

    pub(crate) fn cache_route(&self, route: Route) {
        *self.cached_route.lock() = route.into();
    }

    /// Enqueues `datagram`, dropping it and returning `false` if the queue
    /// is already at its byte cap.
    pub(crate) fn enqueue(&self, datagram: Datagram) -> bool {
        let len = datagram.len();

        let mut queue = self.queue.lock();
        if self.queue_bytes.load(Ordering::Relaxed) + len > self.queue_cap_bytes {
            return false;
        }

        queue.push_back(datagram);
        self.queue_bytes.fetch_add(len, Ordering::Relaxed);
        drop(queue);

        self.notify.notify_one();
        true
    }

    /// Non-blocking dequeue of the next datagram, if any.
    pub(crate) fn try_dequeue(&self) -> Option<Datagram> {
        let mut queue = self.queue.lock();
        let datagram = queue.pop_front()?;
        self.queue_bytes
            .fetch_sub(datagram.len(), Ordering::Relaxed);
        Some(datagram)
    }

    /// Waits for at least one datagram to be queued, then dequeues it.
    pub(crate) async fn dequeue_blocking(&self) -> Datagram {
        loop {
            if let Some(datagram) = self.try_dequeue() {
                return datagram;
            }

            self.notify.notified().await;
        }
    }

    fn has_queued(&self) -> bool {
        !self.queue.lock().is_empty()
    }

    /// Resolves once at least one datagram is queued, without consuming it.
    /// The readiness predicate backing `poll`.
    pub(crate) async fn wait_readable(&self) {
        loop {
            if self.has_queued() {
                return;
            }

            self.notify.notified().await;
        }
    }

    /// Drains and discards all queued datagrams, e.g. on release.
    pub(crate) fn drain(&self) {
        let mut queue = self.queue.lock();
        queue.clear();
        self.queue_bytes.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datagram::SourceEndpoint;

    fn dgram(payload: &[u8]) -> Datagram {
        Datagram {
            payload: payload.to_vec(),
            source: SourceEndpoint {
                addr: Ipv4Addr::LOCALHOST,
                port: 10,
            },
        }
    }

    #[test]
    fn fifo_order_is_preserved() {
        let socket = Socket::new(1);
        socket.enqueue(dgram(b"1"));
        socket.enqueue(dgram(b"2"));
        socket.enqueue(dgram(b"3"));

        assert_eq!(socket.try_dequeue().unwrap().payload, b"1");
        assert_eq!(socket.try_dequeue().unwrap().payload, b"2");
        assert_eq!(socket.try_dequeue().unwrap().payload, b"3");
        assert!(socket.try_dequeue().is_none());
    }

    #[test]
    fn overflow_is_a_silent_drop() {
        let socket = Socket::new(1);
        let big = vec![0u8; DEFAULT_RECV_QUEUE_CAP_BYTES];

        assert!(socket.enqueue(dgram(&big)));
        assert!(!socket.enqueue(dgram(b"one too many")));
    }
}
