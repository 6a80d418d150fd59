//! Wire-adjacent data types shared by the send and receive paths:
//! destination descriptor, address record, and inbound datagram record.

use std::net::Ipv4Addr;

/// A single (address, port) endpoint paired with a byte count.
///
/// The `bytes` field is output-only on receive (bytes delivered into the
/// corresponding buffer) and ignored on send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub addr: Ipv4Addr,
    pub port: u8,
    pub bytes: u32,
}

impl Destination {
    pub fn new(addr: Ipv4Addr, port: u8) -> Self {
        Self {
            addr,
            port,
            bytes: 0,
        }
    }
}

/// A variable-length list of destinations: bind target (count=1), sendmsg
/// target list (count>=1), or recvmsg out-parameter (count set on return).
#[derive(Debug, Clone, Default)]
pub struct AddressRecord {
    pub destinations: Vec<Destination>,
}

impl AddressRecord {
    pub fn single(addr: Ipv4Addr, port: u8) -> Self {
        Self {
            destinations: vec![Destination::new(addr, port)],
        }
    }

    pub fn count(&self) -> usize {
        self.destinations.len()
    }
}

/// A source endpoint recorded at enqueue time by the inbound handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceEndpoint {
    pub addr: Ipv4Addr,
    pub port: u8,
}

/// A datagram sitting in a socket's receive queue, already stripped of its
/// Swift header.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub payload: Vec<u8>,
    pub source: SourceEndpoint,
}

impl Datagram {
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
