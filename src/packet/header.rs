//! Fixed 12-byte header and packet framing.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                     Acknowledgment Number                     |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |          Flags (S A F r)      |            Window             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                     Payload (0..=1460 bytes)                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! All fields are big-endian. There is no length field and no checksum:
//! the payload is whatever follows the header in the datagram.

use crate::error::{Error, Result};
use crate::packet::flags::Flags;

/// Byte length of the header on the wire.
pub const HEADER_LEN: usize = 12;
/// Largest payload carried by one packet.
pub const MAX_PAYLOAD: usize = 1460;
/// Largest datagram ever sent or expected.
pub const MAX_PACKET: usize = HEADER_LEN + MAX_PAYLOAD;

const OFF_SEQ: usize = 0;
const OFF_ACK: usize = 4;
const OFF_FLAGS: usize = 8;
const OFF_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub seq: u32,
    pub ack: u32,
    /// Raw flag bits; see [`Header::flags`] for the decoded view.
    pub flags: u16,
    pub window: u16,
}

impl Header {
    pub fn new(seq: u32, ack: u32, flags: Flags, window: u16) -> Self {
        Header {
            seq,
            ack,
            flags: flags.encode(),
            window,
        }
    }

    pub fn flags(&self) -> Flags {
        Flags::decode(self.flags)
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.seq.to_be_bytes());
        buf[OFF_ACK..OFF_ACK + 4].copy_from_slice(&self.ack.to_be_bytes());
        buf[OFF_FLAGS..OFF_FLAGS + 2].copy_from_slice(&self.flags.to_be_bytes());
        buf[OFF_WINDOW..OFF_WINDOW + 2].copy_from_slice(&self.window.to_be_bytes());
        buf
    }

    /// Parse the first [`HEADER_LEN`] bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(Error::MalformedHeader {
                expected: HEADER_LEN,
                actual: buf.len(),
            });
        }
        Ok(Header {
            seq: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            ack: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            flags: u16::from_be_bytes([buf[OFF_FLAGS], buf[OFF_FLAGS + 1]]),
            window: u16::from_be_bytes([buf[OFF_WINDOW], buf[OFF_WINDOW + 1]]),
        })
    }
}

/// Build a datagram: header followed by the payload, if any.
pub fn encode(
    seq: u32,
    ack: u32,
    flags: Flags,
    window: u16,
    payload: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let payload = payload.unwrap_or_default();
    if payload.len() > MAX_PAYLOAD {
        return Err(Error::PayloadTooLarge(payload.len()));
    }
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&Header::new(seq, ack, flags, window).encode());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// A received datagram, borrowing its payload from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    pub header: Header,
    /// `None` when nothing follows the header.
    pub payload: Option<&'a [u8]>,
}

impl<'a> Packet<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        let header = Header::decode(buf)?;
        let payload = match &buf[HEADER_LEN..] {
            [] => None,
            rest => Some(rest),
        };
        Ok(Packet { header, payload })
    }
}
