//! IPv4 header encoding and decoding.
//!
//! Wire format (20 bytes, network byte order, no options emitted):
//! ```text
//! +---------+-----+--------------+----------------+------------------+
//! | Ver/IHL | TOS | Total length | Identification | Flags/Frag. off. |
//! | 1 byte  | 1 B | 2 bytes      | 2 bytes        | 2 bytes          |
//! +---------+-----+--------------+----------------+------------------+
//! | TTL     | Proto | Checksum   | Source address | Destination addr |
//! | 1 byte  | 1 B   | 2 bytes    | 4 bytes        | 4 bytes          |
//! +---------+-------+------------+----------------+------------------+
//! ```

use std::net::Ipv4Addr;

use byteorder::{ByteOrder, NetworkEndian};

use super::checksum;
use crate::core::WireError;
use crate::core::constants::{DEFAULT_TTL, IPV4_HEADER_LEN, IPV4_VERSION};

/// Decoded IPv4 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    /// Type of service byte.
    pub tos: u8,
    /// Header plus payload length.
    pub total_len: u16,
    /// Identification.
    pub ident: u16,
    /// Flags and fragment offset; always zero when emitted.
    pub flags_frag: u16,
    /// Time to live.
    pub ttl: u8,
    /// Protocol id of the payload.
    pub protocol: u8,
    /// Header checksum as read off the wire (recomputed on emit).
    pub checksum: u16,
    /// Source address.
    pub src: Ipv4Addr,
    /// Destination address.
    pub dst: Ipv4Addr,
}

impl Ipv4Header {
    /// Header for a locally originated datagram carrying `payload_len` bytes.
    pub fn new(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, ident: u16, payload_len: usize) -> Self {
        Self {
            tos: 0,
            total_len: (IPV4_HEADER_LEN + payload_len) as u16,
            ident,
            flags_frag: 0,
            ttl: DEFAULT_TTL,
            protocol,
            checksum: 0,
            src,
            dst,
        }
    }

    /// Parse a datagram into its header and payload.
    ///
    /// The payload is trimmed to the total length and starts after any
    /// options announced by the IHL field.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), WireError> {
        if bytes.len() < IPV4_HEADER_LEN {
            return Err(WireError::TooShort {
                expected: IPV4_HEADER_LEN,
                actual: bytes.len(),
            });
        }

        let version = bytes[0] >> 4;
        if version != IPV4_VERSION {
            return Err(WireError::UnsupportedVersion(version));
        }

        let ihl = bytes[0] & 0x0f;
        let header_len = ihl as usize * 4;
        if header_len < IPV4_HEADER_LEN {
            return Err(WireError::BadHeaderLength(ihl));
        }

        let total_len = NetworkEndian::read_u16(&bytes[2..4]);
        if (total_len as usize) < header_len || total_len as usize > bytes.len() {
            return Err(WireError::BadTotalLength {
                declared: total_len as usize,
                actual: bytes.len(),
            });
        }

        let header = Self {
            tos: bytes[1],
            total_len,
            ident: NetworkEndian::read_u16(&bytes[4..6]),
            flags_frag: NetworkEndian::read_u16(&bytes[6..8]),
            ttl: bytes[8],
            protocol: bytes[9],
            checksum: NetworkEndian::read_u16(&bytes[10..12]),
            src: Ipv4Addr::new(bytes[12], bytes[13], bytes[14], bytes[15]),
            dst: Ipv4Addr::new(bytes[16], bytes[17], bytes[18], bytes[19]),
        };

        Ok((header, &bytes[header_len..total_len as usize]))
    }

    /// Serialize to 20 bytes with a freshly computed checksum.
    ///
    /// The checksum is computed with the checksum field zeroed.
    pub fn to_bytes(&self) -> [u8; IPV4_HEADER_LEN] {
        let mut buf = [0u8; IPV4_HEADER_LEN];
        buf[0] = (IPV4_VERSION << 4) | (IPV4_HEADER_LEN / 4) as u8;
        buf[1] = self.tos;
        NetworkEndian::write_u16(&mut buf[2..4], self.total_len);
        NetworkEndian::write_u16(&mut buf[4..6], self.ident);
        NetworkEndian::write_u16(&mut buf[6..8], self.flags_frag);
        buf[8] = self.ttl;
        buf[9] = self.protocol;
        buf[12..16].copy_from_slice(&self.src.octets());
        buf[16..20].copy_from_slice(&self.dst.octets());

        let sum = checksum::internet(&buf);
        NetworkEndian::write_u16(&mut buf[10..12], sum);
        buf
    }

    /// Serialize header and payload into one datagram.
    pub fn emit(&self, payload: &[u8]) -> Vec<u8> {
        let mut datagram = Vec::with_capacity(IPV4_HEADER_LEN + payload.len());
        datagram.extend_from_slice(&self.to_bytes());
        datagram.extend_from_slice(payload);
        datagram
    }
}

/// Whether the header (IHL words) at the start of `datagram` checksums to zero.
pub fn verify_header_checksum(datagram: &[u8]) -> bool {
    let Some(&first) = datagram.first() else {
        return false;
    };
    let header_len = (first & 0x0f) as usize * 4;
    datagram.len() >= header_len && checksum::verify(&datagram[..header_len])
}
