//! Multi-datagram recvmsg: drains whatever is already queued into a gather
//! vector without blocking past the first datagram.

use crate::datagram::{AddressRecord, Destination};
use crate::error::{Result, SwiftError};
use crate::socket::Socket;

/// Outcome of a [`recvmsg`] call.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecvReport {
    /// Cumulative bytes copied across every buffer filled this call.
    pub bytes_copied: usize,
    /// Set if any datagram was longer than the buffer it was copied into.
    pub truncated: bool,
    /// Number of buffers actually filled; equivalently, `out_address`'s
    /// final `count`.
    pub count: usize,
}

/// Drains up to `buffers.len()` queued datagrams into `buffers`, reporting
/// each one's source endpoint in `out_address` if provided.
///
/// Blocks for the first datagram unless `non_blocking` is set or one is
/// already queued; never blocks to fill buffers beyond the first. This lets
/// a caller opportunistically batch up whatever has already arrived without
/// adding latency waiting for more.
pub async fn recvmsg(
    socket: &Socket,
    buffers: &mut [Vec<u8>],
    mut out_address: Option<&mut AddressRecord>,
    non_blocking: bool,
) -> Result<RecvReport> {
    if let Some(record) = out_address.as_deref_mut() {
        record.destinations.clear();
    }

    if buffers.is_empty() {
        return Ok(RecvReport::default());
    }

    let first = if non_blocking {
        socket.try_dequeue().ok_or(SwiftError::WouldBlock)?
    } else {
        socket.dequeue_blocking().await
    };

    let mut report = RecvReport::default();
    let mut datagram = Some(first);

    let mut i = 0;
    while i < buffers.len() {
        let Some(current) = datagram.take() else {
            break;
        };

        let buf = &mut buffers[i];
        let copied = current.len().min(buf.len());
        buf[..copied].copy_from_slice(&current.payload[..copied]);
        buf.truncate(copied);

        if current.len() > copied {
            report.truncated = true;
        }

        if let Some(record) = out_address.as_deref_mut() {
            record.destinations.push(Destination {
                addr: current.source.addr,
                port: current.source.port,
                bytes: copied as u32,
            });
        }

        report.bytes_copied += copied;
        i += 1;

        if i < buffers.len() {
            datagram = socket.try_dequeue();
            if datagram.is_none() {
                break;
            }
        }
    }

    report.count = i;

    Ok(report)
}
