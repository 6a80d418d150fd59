//! The Swift header: 1-byte source port, 1-byte destination port, 2-byte
//! big-endian length covering header + payload.

use bytes::{Buf, BufMut, BytesMut};

/// Size of the on-wire header, in bytes.
pub const SWIFT_HDR_SIZE: usize = 4;

/// Lowest port number a caller may bind or be assigned; 0 means "unset".
pub const MIN_PORT: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwiftHeader {
    pub src: u8,
    pub dst: u8,
    pub length: u16,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("datagram shorter than the {SWIFT_HDR_SIZE}-byte header")]
    TooShort,
    #[error("declared length {declared} is below the header size")]
    LengthBelowHeader { declared: u16 },
    #[error("declared length {declared} exceeds the {actual}-byte datagram")]
    LengthExceedsDatagram { declared: u16, actual: usize },
    #[error("source port must be non-zero")]
    ZeroSrcPort,
    #[error("destination port must be non-zero")]
    ZeroDstPort,
}

impl SwiftHeader {
    pub fn encode(&self, payload: &[u8], out: &mut BytesMut) {
        out.reserve(SWIFT_HDR_SIZE + payload.len());
        out.put_u8(self.src);
        out.put_u8(self.dst);
        out.put_u16(self.length);
        out.put_slice(payload);
    }
}

/// Parses and validates a Swift datagram.
///
/// On success, returns the header and the payload trimmed to the header's
/// declared length (excess trailing bytes, if any, are dropped before
/// delivery).
pub fn decode(mut datagram: &[u8]) -> Result<(SwiftHeader, &[u8]), DecodeError> {
    if datagram.len() < SWIFT_HDR_SIZE {
        return Err(DecodeError::TooShort);
    }

    let src = datagram.get_u8();
    let dst = datagram.get_u8();
    let length = datagram.get_u16();

    if (length as usize) < SWIFT_HDR_SIZE {
        return Err(DecodeError::LengthBelowHeader { declared: length });
    }

    let total_len = datagram.len() + SWIFT_HDR_SIZE;
    if length as usize > total_len {
        return Err(DecodeError::LengthExceedsDatagram {
            declared: length,
            actual: total_len,
        });
    }

    if src == 0 {
        return Err(DecodeError::ZeroSrcPort);
    }
    if dst == 0 {
        return Err(DecodeError::ZeroDstPort);
    }

    let payload_len = length as usize - SWIFT_HDR_SIZE;

    Ok((SwiftHeader { src, dst, length }, &datagram[..payload_len]))
}
