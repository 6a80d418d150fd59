//! Process-wide port → socket demultiplexer.
//!
//! A fixed-size array indexed directly by port number, the way an 8-bit port
//! space wants to be modeled: dense and small enough that a flat array beats
//! a hash map. A single [`parking_lot::Mutex`] covers the whole table; the
//! port space is tiny enough that lock contention isn't worth guarding
//! against with anything fancier.

use parking_lot::Mutex;

use crate::error::SwiftError;
use crate::wire::MIN_PORT;

const TABLE_SIZE: usize = 256;

pub struct PortTable {
    slots: Mutex<[Option<u64>; TABLE_SIZE]>,
}

impl Default for PortTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PortTable {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new([None; TABLE_SIZE]),
        }
    }

    /// Returns the id of the socket owning `port`, if any.
    pub fn lookup(&self, port: u8) -> Option<u64> {
        self.slots.lock()[port as usize]
    }

    /// Claims `port` for `socket_id`.
    ///
    /// Fails with [`SwiftError::InvalidArgument`] if `port == 0` and with
    /// [`SwiftError::AddressInUse`] if the slot is already occupied.
    pub fn bind(&self, port: u8, socket_id: u64) -> Result<(), SwiftError> {
        if port == 0 {
            return Err(SwiftError::InvalidArgument("port must be in [1, 255]"));
        }

        let mut slots = self.slots.lock();
        if slots[port as usize].is_some() {
            return Err(SwiftError::AddressInUse);
        }

        slots[port as usize] = Some(socket_id);
        tracing::trace!(port, socket_id, "bound port");

        Ok(())
    }

    /// Returns the lowest free port in `[MIN_PORT, 255]`, claiming it for
    /// `socket_id` atomically with the scan.
    pub fn allocate_ephemeral(&self, socket_id: u64) -> Result<u8, SwiftError> {
        let mut slots = self.slots.lock();

        for port in MIN_PORT..=255u8 {
            if slots[port as usize].is_none() {
                slots[port as usize] = Some(socket_id);
                tracing::trace!(port, socket_id, "allocated ephemeral port");
                return Ok(port);
            }
        }

        Err(SwiftError::OutOfMemory)
    }

    /// Unconditionally clears `port`'s slot. A no-op if already empty.
    pub fn release(&self, port: u8) {
        if port == 0 {
            return;
        }

        let mut slots = self.slots.lock();
        if slots[port as usize].take().is_some() {
            tracing::trace!(port, "released port");
        }
    }
}
