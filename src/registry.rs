//! The process-wide protocol registry: owns the port table, the live socket
//! set, and drop counters, and implements the inbound handler that the IP
//! layer drives.
//!
//! A single owned registry threaded through every operation, rather than
//! ambient global state. Each instance is independent, so tests (or a
//! process hosting several namespaces) can run more than one side by side.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::datagram::{AddressRecord, Datagram, SourceEndpoint};
use crate::error::{Result, SwiftError};
use crate::port_table::PortTable;
use crate::socket::Socket;
use crate::transport::Transport;
use crate::wire;

/// Snapshot of the silent-drop counters the receive path maintains.
#[derive(Debug, Default, Clone, Copy)]
pub struct Stats {
    pub malformed_dropped: u64,
    pub unroutable_dropped: u64,
    pub queue_overflow_dropped: u64,
}

#[derive(Default)]
struct Counters {
    malformed_dropped: AtomicU64,
    unroutable_dropped: AtomicU64,
    queue_overflow_dropped: AtomicU64,
}

/// Owns the port table and the set of live sockets for one Swift/MPTP
/// instance. Create one per process (or per test); there is no implicit
/// global singleton, so tests can run several instances concurrently
/// without sharing port state.
pub struct SwiftProtocol {
    port_table: PortTable,
    sockets: Mutex<HashMap<u64, Arc<Socket>>>,
    next_socket_id: AtomicU64,
    transport: Arc<dyn Transport>,
    counters: Counters,
}

impl SwiftProtocol {
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            port_table: PortTable::new(),
            sockets: Mutex::new(HashMap::new()),
            next_socket_id: AtomicU64::new(1),
            transport,
            counters: Counters::default(),
        })
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn stats(&self) -> Stats {
        Stats {
            malformed_dropped: self.counters.malformed_dropped.load(Ordering::Relaxed),
            unroutable_dropped: self.counters.unroutable_dropped.load(Ordering::Relaxed),
            queue_overflow_dropped: self.counters.queue_overflow_dropped.load(Ordering::Relaxed),
        }
    }

    /// Allocates a fresh, unbound socket.
    pub fn create_socket(&self) -> Arc<Socket> {
        let id = self.next_socket_id.fetch_add(1, Ordering::Relaxed);
        let socket = Arc::new(Socket::new(id));

        self.sockets.lock().insert(id, socket.clone());
        socket
    }

    /// Binds `socket` to the single destination descriptor in `address`.
    pub fn bind(&self, socket: &Socket, address: &AddressRecord) -> Result<()> {
        if socket.src() != 0 || socket.is_connected() {
            return Err(SwiftError::InvalidArgument(
                "socket is already bound or connected",
            ));
        }

        if address.count() != 1 {
            return Err(SwiftError::InvalidArgument(
                "bind requires exactly one destination descriptor",
            ));
        }

        let port = address.destinations[0].port;
        if port == 0 {
            return Err(SwiftError::InvalidArgument("port must be in [1, 255]"));
        }

        self.port_table.bind(port, socket.id)?;
        socket.mark_bound(port);

        tracing::debug!(socket = socket.id, port, "socket bound");

        Ok(())
    }

    /// Connects `socket` to the first destination descriptor in `address`;
    /// any further descriptors are ignored.
    pub fn connect(&self, socket: &Socket, address: &AddressRecord) -> Result<()> {
        if socket.src() != 0 {
            return Err(SwiftError::InvalidArgument(
                "connect requires a fresh (unbound) socket",
            ));
        }

        let Some(target) = address.destinations.first() else {
            return Err(SwiftError::InvalidArgument(
                "connect requires at least one destination descriptor",
            ));
        };

        if target.port == 0 || target.addr.is_unspecified() {
            return Err(SwiftError::InvalidArgument(
                "connect target must have a non-zero port and address",
            ));
        }

        let src = self.port_table.allocate_ephemeral(socket.id)?;
        socket.mark_connected(src, target.port, target.addr);

        tracing::debug!(
            socket = socket.id,
            src,
            dst = target.port,
            daddr = %target.addr,
            "socket connected"
        );

        Ok(())
    }

    /// Releases `socket`. Idempotent.
    pub fn release(&self, socket: &Socket) {
        let src = socket.src();
        if src != 0 {
            self.port_table.release(src);
        }

        socket.drain();
        socket.mark_released();
        self.sockets.lock().remove(&socket.id);

        tracing::debug!(socket = socket.id, "socket released");
    }

    /// The inbound handler, driven by the IP layer or by a
    /// [`crate::transport::LoopbackTransport`] in tests.
    pub fn handle_inbound(&self, datagram: &[u8], source_addr: Ipv4Addr) {
        let (header, payload) = match wire::decode(datagram) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::trace!("dropping malformed datagram: {e}");
                self.counters.malformed_dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        let Some(socket_id) = self.port_table.lookup(header.dst) else {
            tracing::trace!(port = header.dst, "dropping datagram for unbound port");
            self.counters.unroutable_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let socket = {
            let sockets = self.sockets.lock();
            sockets.get(&socket_id).cloned()
        };

        let Some(socket) = socket else {
            // The owning socket was released between the port-table lookup
            // and this point; treat it the same as "no socket". A benign
            // race, just another drop.
            self.counters.unroutable_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let enqueued = socket.enqueue(Datagram {
            payload: payload.to_vec(),
            source: SourceEndpoint {
                addr: source_addr,
                port: header.src,
            },
        });

        if !enqueued {
            tracing::debug!(socket = socket.id, "receive queue full, dropping datagram");
            self.counters
                .queue_overflow_dropped
                .fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datagram::Destination;
    use crate::socket::SocketState;
    use crate::transport::LoopbackTransport;

    fn harness() -> Arc<SwiftProtocol> {
        let transport = LoopbackTransport::new();
        let protocol = SwiftProtocol::new(transport.clone());
        transport.attach(&protocol);
        protocol
    }

    #[test]
    fn connect_allocates_an_ephemeral_src_and_assigns_dst_daddr() {
        let protocol = harness();
        let socket = protocol.create_socket();

        protocol
            .connect(&socket, &AddressRecord::single(Ipv4Addr::LOCALHOST, 42))
            .unwrap();

        assert_eq!(socket.state(), SocketState::Connected);
        assert_ne!(socket.src(), 0);
        assert_eq!(socket.dst(), 42);
        assert_eq!(socket.daddr(), Ipv4Addr::LOCALHOST);
        assert_eq!(protocol.port_table.lookup(socket.src()), Some(socket.id));
    }

    #[test]
    fn connect_fails_on_an_already_bound_socket() {
        let protocol = harness();
        let socket = protocol.create_socket();
        protocol
            .bind(&socket, &AddressRecord::single(Ipv4Addr::UNSPECIFIED, 7))
            .unwrap();

        let err = protocol
            .connect(&socket, &AddressRecord::single(Ipv4Addr::LOCALHOST, 42))
            .unwrap_err();

        assert!(matches!(err, SwiftError::InvalidArgument(_)));
    }

    #[test]
    fn connect_fails_on_an_empty_address_record() {
        let protocol = harness();
        let socket = protocol.create_socket();

        let err = protocol
            .connect(&socket, &AddressRecord::default())
            .unwrap_err();

        assert!(matches!(err, SwiftError::InvalidArgument(_)));
    }

    #[test]
    fn connect_fails_on_a_zero_port_target() {
        let protocol = harness();
        let socket = protocol.create_socket();

        let record = AddressRecord {
            destinations: vec![Destination::new(Ipv4Addr::LOCALHOST, 0)],
        };
        let err = protocol.connect(&socket, &record).unwrap_err();

        assert!(matches!(err, SwiftError::InvalidArgument(_)));
    }

    #[test]
    fn connect_fails_on_an_unspecified_address() {
        let protocol = harness();
        let socket = protocol.create_socket();

        let record = AddressRecord {
            destinations: vec![Destination::new(Ipv4Addr::UNSPECIFIED, 42)],
        };
        let err = protocol.connect(&socket, &record).unwrap_err();

        assert!(matches!(err, SwiftError::InvalidArgument(_)));
    }
}
