//! The IP-layer collaborator: route lookup and the transmit primitive. The
//! core never talks to a socket directly; it asks a [`Transport`] to
//! resolve a route and hand off a finished datagram, keeping the protocol
//! engine sans-IO and the actual socket ownership in whatever event loop
//! wires it up.

use std::io;
use std::net::Ipv4Addr;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};

use crate::error::SwiftError;
use crate::socket::Route;
use crate::SwiftProtocol;

/// IP protocol number for Swift/MPTP datagrams. Chosen from the unassigned
/// range, the way a kernel module reserves its own protocol number.
pub const IPPROTO_SWIFT: i32 = 143;

pub trait Transport: Send + Sync {
    /// Resolves a route to `daddr`. Implementations may cache internally;
    /// the core's own per-socket route cache is a separate concern layered
    /// on top of this call.
    fn resolve_route(&self, daddr: Ipv4Addr) -> Result<Route, SwiftError>;

    /// Hands a finished, header-and-payload datagram to the network.
    ///
    /// Must not block; a transport whose send buffer is full should return
    /// [`SwiftError::WouldBlock`] rather than blocking the caller.
    fn transmit(&self, route: Route, frame: Bytes) -> Result<(), SwiftError>;
}

/// A transport that delivers datagrams directly to a [`SwiftProtocol`] in
/// the same process, without touching the network. Used by integration
/// tests exercising end-to-end bind/send/recv scenarios by swapping in a
/// deterministic collaborator instead of faking the whole network stack.
///
/// Every destination resolves to the loopback address, and every delivered
/// datagram is reported with source address `127.0.0.1`.
pub struct LoopbackTransport {
    protocol: Mutex<Option<Weak<SwiftProtocol>>>,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            protocol: Mutex::new(None),
        })
    }

    /// Back-references the protocol instance this transport delivers into.
    ///
    /// Called once, right after the owning [`SwiftProtocol`] is wrapped in
    /// an `Arc`. Using a weak back-reference instead of a strong one avoids
    /// a true reference cycle between the protocol and its transport.
    pub fn attach(&self, protocol: &Arc<SwiftProtocol>) {
        *self.protocol.lock() = Some(Arc::downgrade(protocol));
    }
}

impl Transport for LoopbackTransport {
    fn resolve_route(&self, daddr: Ipv4Addr) -> Result<Route, SwiftError> {
        Ok(Route { daddr })
    }

    fn transmit(&self, _route: Route, frame: Bytes) -> Result<(), SwiftError> {
        let protocol = self
            .protocol
            .lock()
            .as_ref()
            .and_then(Weak::upgrade)
            .expect("LoopbackTransport used before attach()");

        protocol.handle_inbound(&frame, Ipv4Addr::LOCALHOST);

        Ok(())
    }
}

/// A transport built on a raw IPv4 socket, for the demo binary.
///
/// Opens a `Type::RAW` socket under [`IPPROTO_SWIFT`] rather than a UDP
/// `Type::DGRAM` socket. Swift runs directly on IP, not on top of UDP.
pub struct RawIpTransport {
    socket: Socket,
}

impl RawIpTransport {
    pub fn bind() -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::from(IPPROTO_SWIFT)))?;
        socket.set_nonblocking(true)?;

        Ok(Self { socket })
    }

    /// Reads one raw IP datagram, strips the IP header, and returns the
    /// Swift frame plus the sender's address.
    ///
    /// This type only implements the non-blocking primitive; callers drive
    /// it from an async context via [`tokio::io::unix::AsyncFd`] or a
    /// blocking thread.
    pub fn try_recv(&self, buf: &mut [u8]) -> io::Result<Option<(Ipv4Addr, usize)>> {
        use std::mem::MaybeUninit;

        let uninit = unsafe {
            std::slice::from_raw_parts_mut(buf.as_mut_ptr().cast::<MaybeUninit<u8>>(), buf.len())
        };

        match self.socket.recv(uninit) {
            Ok(n) => {
                if n < 20 {
                    return Ok(None); // truncated IP header, drop
                }

                let ihl = (buf[0] & 0x0f) as usize * 4;
                if n < ihl {
                    return Ok(None);
                }

                let src = Ipv4Addr::new(buf[12], buf[13], buf[14], buf[15]);
                let payload_len = n - ihl;
                buf.copy_within(ihl..n, 0);

                Ok(Some((src, payload_len)))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn try_send(&self, daddr: Ipv4Addr, frame: &[u8]) -> io::Result<bool> {
        let dest = socket2::SockAddr::from(std::net::SocketAddr::new(daddr.into(), 0));

        match self.socket.send_to(frame, &dest) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl Transport for RawIpTransport {
    fn resolve_route(&self, daddr: Ipv4Addr) -> Result<Route, SwiftError> {
        // Real route resolution belongs to the IP layer. Any reachable
        // IPv4 address is accepted here; an unreachable one surfaces as an
        // I/O error from `transmit` instead.
        Ok(Route { daddr })
    }

    fn transmit(&self, route: Route, frame: Bytes) -> Result<(), SwiftError> {
        match self.try_send(route.daddr, &frame) {
            Ok(true) => Ok(()),
            Ok(false) => Err(SwiftError::WouldBlock),
            Err(_) => Err(SwiftError::RouteUnreachable(route.daddr)),
        }
    }
}
