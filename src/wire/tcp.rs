//! TCP header encoding and decoding.
//!
//! Wire format (20 bytes, no options emitted):
//! ```text
//! +-------------+-------------+------------------+------------------+
//! | Source port | Dest. port  | Sequence number  | Ack number       |
//! | 2 bytes     | 2 bytes     | 4 bytes          | 4 bytes          |
//! +-------------+-------------+------------------+------------------+
//! | Offset/Flags| Window      | Checksum         | Urgent pointer   |
//! | 2 bytes     | 2 bytes     | 2 bytes          | 2 bytes          |
//! +-------------+-------------+------------------+------------------+
//! ```
//!
//! The checksum covers the IPv4 pseudo-header, the header and the payload.

use std::fmt;
use std::net::Ipv4Addr;
use std::ops::BitOr;

use byteorder::{ByteOrder, NetworkEndian};

use super::checksum;
use crate::core::WireError;
use crate::core::constants::{DEFAULT_WINDOW, IPPROTO_TCP, TCP_HEADER_LEN};

/// TCP control flags (low byte of the offset/flags field).
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpFlags(u8);

impl TcpFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// No more data from sender.
    pub const FIN: Self = Self(0x01);
    /// Synchronize sequence numbers.
    pub const SYN: Self = Self(0x02);
    /// Reset the connection.
    pub const RST: Self = Self(0x04);
    /// Push function.
    pub const PSH: Self = Self(0x08);
    /// Acknowledgment field is significant.
    pub const ACK: Self = Self(0x10);

    /// Create flags from a raw byte.
    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Get the raw byte value.
    pub fn as_byte(self) -> u8 {
        self.0
    }

    /// Whether every flag in `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for TcpFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for TcpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::SYN, "SYN"),
            (Self::ACK, "ACK"),
            (Self::FIN, "FIN"),
            (Self::RST, "RST"),
            (Self::PSH, "PSH"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "TcpFlags({})", set.join("|"))
    }
}

/// Decoded TCP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpHeader {
    /// Source port.
    pub src_port: u16,
    /// Destination port.
    pub dst_port: u16,
    /// Sequence number.
    pub seq: u32,
    /// Acknowledgment number.
    pub ack: u32,
    /// Control flags.
    pub flags: TcpFlags,
    /// Advertised receive window.
    pub window: u16,
    /// Checksum as read off the wire.
    pub checksum: u16,
    /// Urgent pointer (never used).
    pub urgent: u16,
}

impl TcpHeader {
    /// Header with the default window and no urgent data.
    pub fn new(src_port: u16, dst_port: u16, seq: u32, ack: u32, flags: TcpFlags) -> Self {
        Self {
            src_port,
            dst_port,
            seq,
            ack,
            flags,
            window: DEFAULT_WINDOW,
            checksum: 0,
            urgent: 0,
        }
    }

    /// Parse a segment into its header and payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), WireError> {
        if bytes.len() < TCP_HEADER_LEN {
            return Err(WireError::TooShort {
                expected: TCP_HEADER_LEN,
                actual: bytes.len(),
            });
        }

        let offset_flags = NetworkEndian::read_u16(&bytes[12..14]);
        let data_offset = (offset_flags >> 12) as u8;
        let header_len = data_offset as usize * 4;
        if header_len < TCP_HEADER_LEN || header_len > bytes.len() {
            return Err(WireError::BadDataOffset(data_offset));
        }

        let header = Self {
            src_port: NetworkEndian::read_u16(&bytes[0..2]),
            dst_port: NetworkEndian::read_u16(&bytes[2..4]),
            seq: NetworkEndian::read_u32(&bytes[4..8]),
            ack: NetworkEndian::read_u32(&bytes[8..12]),
            flags: TcpFlags::from_byte(offset_flags as u8),
            window: NetworkEndian::read_u16(&bytes[14..16]),
            checksum: NetworkEndian::read_u16(&bytes[16..18]),
            urgent: NetworkEndian::read_u16(&bytes[18..20]),
        };

        Ok((header, &bytes[header_len..]))
    }

    /// Serialize to 20 bytes with a zero checksum field.
    pub fn to_bytes(&self) -> [u8; TCP_HEADER_LEN] {
        let mut buf = [0u8; TCP_HEADER_LEN];
        NetworkEndian::write_u16(&mut buf[0..2], self.src_port);
        NetworkEndian::write_u16(&mut buf[2..4], self.dst_port);
        NetworkEndian::write_u32(&mut buf[4..8], self.seq);
        NetworkEndian::write_u32(&mut buf[8..12], self.ack);
        let offset_flags = ((TCP_HEADER_LEN as u16 / 4) << 12) | self.flags.as_byte() as u16;
        NetworkEndian::write_u16(&mut buf[12..14], offset_flags);
        NetworkEndian::write_u16(&mut buf[14..16], self.window);
        NetworkEndian::write_u16(&mut buf[18..20], self.urgent);
        buf
    }

    /// Serialize header and payload with the checksum filled in.
    ///
    /// `src` and `dst` are the IP addresses the segment travels between.
    pub fn emit(&self, payload: &[u8], src: Ipv4Addr, dst: Ipv4Addr) -> Vec<u8> {
        let mut segment = Vec::with_capacity(TCP_HEADER_LEN + payload.len());
        segment.extend_from_slice(&self.to_bytes());
        segment.extend_from_slice(payload);

        let sum = !checksum::combine(&[
            checksum::pseudo_header(src, dst, IPPROTO_TCP, segment.len() as u16),
            checksum::data(&segment),
        ]);
        NetworkEndian::write_u16(&mut segment[16..18], sum);
        segment
    }
}

/// Whether a received segment's checksum verifies against its pseudo-header.
pub fn verify_checksum(segment: &[u8], src: Ipv4Addr, dst: Ipv4Addr) -> bool {
    checksum::combine(&[
        checksum::pseudo_header(src, dst, IPPROTO_TCP, segment.len() as u16),
        checksum::data(segment),
    ]) == 0xffff
}
