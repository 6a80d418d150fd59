//! Multi-destination sendmsg.

use bytes::BytesMut;
use rand::Rng;

use crate::datagram::AddressRecord;
use crate::error::{Result, SwiftError};
use crate::registry::SwiftProtocol;
use crate::socket::{Route, Socket};
use crate::wire::{SwiftHeader, MIN_PORT};

/// Sends `payloads[i]` to the i-th destination (unconnected mode) or to the
/// connected peer (connected mode).
///
/// Returns the number of datagrams successfully handed to the transport.
/// On error, datagrams already handed off before the failing index are
/// **not** retracted; the protocol has no rollback. Only the return value's
/// *count* is lost for the caller, the bytes are already in flight.
pub fn sendmsg(
    protocol: &SwiftProtocol,
    socket: &Socket,
    payloads: &[&[u8]],
    target: Option<&AddressRecord>,
) -> Result<usize> {
    let src = resolve_source_port(protocol, socket)?;

    let n = match target {
        Some(record) => record.count().min(payloads.len()),
        None if socket.is_connected() => payloads.len(),
        None => return Err(SwiftError::DestinationRequired),
    };

    let mut sent = 0;

    for i in 0..n {
        let (daddr, dport) = match target {
            Some(record) => {
                let dest = &record.destinations[i];
                (dest.addr, dest.port)
            }
            None => (socket.daddr(), socket.dst()),
        };

        if dport == 0 {
            return Err(SwiftError::InvalidArgument(
                "destination port must be in [1, 255]",
            ));
        }

        let payload = payloads[i];
        let header = SwiftHeader {
            src,
            dst: dport,
            length: (crate::wire::SWIFT_HDR_SIZE + payload.len()) as u16,
        };

        let mut frame = BytesMut::with_capacity(crate::wire::SWIFT_HDR_SIZE + payload.len());
        header.encode(payload, &mut frame);

        let route = resolve_route(protocol, socket, target.is_some(), daddr)?;

        protocol.transport().transmit(route, frame.freeze())?;

        sent += 1;
    }

    Ok(sent)
}

/// Uses the bound source port if one is set, or stamps a transient ephemeral
/// label without claiming a port-table slot. A one-off unbound send has no
/// queue a reply could land in, so there is nothing to bind.
fn resolve_source_port(protocol: &SwiftProtocol, socket: &Socket) -> Result<u8> {
    let bound = socket.src();
    if bound != 0 {
        return Ok(bound);
    }

    let _ = protocol; // source-port stamping never touches the port table here
    Ok(rand::thread_rng().gen_range(MIN_PORT..=255))
}

/// Reuses the socket's cached route only when sending to its connected
/// peer; never caches per-destination unconnected sends (different
/// destinations would thrash the cache).
fn resolve_route(
    protocol: &SwiftProtocol,
    socket: &Socket,
    has_explicit_target: bool,
    daddr: std::net::Ipv4Addr,
) -> Result<Route> {
    if !has_explicit_target && socket.is_connected() {
        if let Some(route) = socket.cached_route() {
            if route.daddr == daddr {
                return Ok(route);
            }
        }

        let route = protocol.transport().resolve_route(daddr)?;
        socket.cache_route(route);
        return Ok(route);
    }

    protocol.transport().resolve_route(daddr)
}
