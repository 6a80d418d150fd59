//! Swift/MPTP: an unreliable datagram transport layered directly on IP,
//! distinguished by multi-destination `sendmsg` and multi-source `recvmsg`.
//!
//! A single [`SwiftSocket::sendmsg`] call can emit independent payloads to
//! several destinations; a single [`SwiftSocket::recvmsg`] call drains
//! several queued datagrams, each reporting its own source endpoint.
//!
//! The facade in this file (create/bind/connect/sendmsg/recvmsg/release) is
//! intentionally thin; the real logic lives in [`registry`], [`send`] and
//! [`recv`]. Socket-API dispatch is glue. The transport engine underneath it
//! is where the interesting work happens.

mod datagram;
mod error;
mod port_table;
mod recv;
mod registry;
mod send;
mod socket;
mod transport;
mod wire;

pub use datagram::{AddressRecord, Datagram, Destination, SourceEndpoint};
pub use error::{Result, SwiftError};
pub use recv::RecvReport;
pub use registry::{Stats, SwiftProtocol};
pub use socket::{Route, Socket, SocketState, DEFAULT_RECV_QUEUE_CAP_BYTES};
pub use transport::{LoopbackTransport, RawIpTransport, Transport, IPPROTO_SWIFT};
pub use wire::{decode, DecodeError, SwiftHeader, MIN_PORT, SWIFT_HDR_SIZE};

use std::sync::Arc;

/// A handle to one Swift socket, bundling the socket's own state with the
/// [`SwiftProtocol`] registry it is registered in.
///
/// Operations the underlying transport doesn't support (`listen`, `accept`,
/// `socketpair`, `shutdown`, `get`/`setsockopt`, `ioctl`, `mmap`, `sendpage`,
/// `getname`) are represented, not omitted, so a caller matching on them gets
/// [`SwiftError::NotSupported`] rather than a missing method.
pub struct SwiftSocket {
    protocol: Arc<SwiftProtocol>,
    inner: Arc<Socket>,
}

impl SwiftSocket {
    /// Allocates a fresh, unbound socket.
    pub fn create(protocol: &Arc<SwiftProtocol>) -> Self {
        Self {
            protocol: protocol.clone(),
            inner: protocol.create_socket(),
        }
    }

    pub fn state(&self) -> SocketState {
        self.inner.state()
    }

    /// Binds the socket to the single destination descriptor in `address`.
    pub fn bind(&self, address: &AddressRecord) -> Result<()> {
        self.protocol.bind(&self.inner, address)
    }

    /// Connects the socket to the first destination descriptor in `address`.
    pub fn connect(&self, address: &AddressRecord) -> Result<()> {
        self.protocol.connect(&self.inner, address)
    }

    /// Sends each of `payloads` to the matching positional entry of `target`,
    /// or to the connected peer if no target is given. Returns the number of
    /// datagrams queued to the transport.
    pub fn sendmsg(&self, payloads: &[&[u8]], target: Option<&AddressRecord>) -> Result<usize> {
        send::sendmsg(&self.protocol, &self.inner, payloads, target)
    }

    /// Drains queued datagrams into `buffers`, reporting each one's source
    /// endpoint in `out_address` if given.
    pub async fn recvmsg(
        &self,
        buffers: &mut [Vec<u8>],
        out_address: Option<&mut AddressRecord>,
        non_blocking: bool,
    ) -> Result<RecvReport> {
        recv::recvmsg(&self.inner, buffers, out_address, non_blocking).await
    }

    /// Resolves once a datagram is ready to be drained, for callers
    /// integrating with a generic readiness predicate (the `poll` use case).
    pub async fn readable(&self) {
        self.inner.wait_readable().await;
    }

    /// Releases the socket: frees its port-table slot, drains its receive
    /// queue, and drops its cached route.
    pub fn release(self) {
        self.protocol.release(&self.inner);
    }

    /// Not implemented by this transport. Named individually, rather than
    /// collapsed into one catch-all, so a caller's `match` on the socket API
    /// stays exhaustive instead of relying on an absent method.
    pub fn listen(&self) -> Result<()> {
        Err(SwiftError::NotSupported)
    }

    pub fn accept(&self) -> Result<SwiftSocket> {
        Err(SwiftError::NotSupported)
    }

    pub fn socketpair() -> Result<(SwiftSocket, SwiftSocket)> {
        Err(SwiftError::NotSupported)
    }

    pub fn shutdown(&self) -> Result<()> {
        Err(SwiftError::NotSupported)
    }

    pub fn getsockopt(&self) -> Result<()> {
        Err(SwiftError::NotSupported)
    }

    pub fn setsockopt(&self) -> Result<()> {
        Err(SwiftError::NotSupported)
    }

    pub fn ioctl(&self) -> Result<()> {
        Err(SwiftError::NotSupported)
    }

    pub fn mmap(&self) -> Result<()> {
        Err(SwiftError::NotSupported)
    }

    pub fn sendpage(&self) -> Result<()> {
        Err(SwiftError::NotSupported)
    }

    pub fn getname(&self) -> Result<()> {
        Err(SwiftError::NotSupported)
    }
}
