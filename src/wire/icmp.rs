//! ICMP error messages.
//!
//! Only Time Exceeded is ever generated:
//! ```text
//! +--------+--------+----------+----------+-------------------------------+
//! | Type   | Code   | Checksum | Unused   | Original IP header + 8 bytes  |
//! | 1 byte | 1 byte | 2 bytes  | 4 bytes  | 28 bytes                      |
//! +--------+--------+----------+----------+-------------------------------+
//! ```

use byteorder::{ByteOrder, NetworkEndian};

use super::checksum;
use crate::core::WireError;
use crate::core::constants::{ICMP_HEADER_LEN, ICMP_QUOTE_LEN, ICMP_TIME_EXCEEDED, ICMP_TTL_EXPIRED};

/// Decoded fixed part of an ICMP message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpHeader {
    /// Message type.
    pub kind: u8,
    /// Message subtype.
    pub code: u8,
    /// Checksum as read off the wire.
    pub checksum: u16,
}

impl IcmpHeader {
    /// Parse a message into its header and body.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), WireError> {
        if bytes.len() < ICMP_HEADER_LEN {
            return Err(WireError::TooShort {
                expected: ICMP_HEADER_LEN,
                actual: bytes.len(),
            });
        }

        let header = Self {
            kind: bytes[0],
            code: bytes[1],
            checksum: NetworkEndian::read_u16(&bytes[2..4]),
        };
        Ok((header, &bytes[ICMP_HEADER_LEN..]))
    }
}

/// Build a Time Exceeded (TTL expired in transit) message about `original`.
///
/// The body quotes the original header plus the first 8 bytes of its
/// payload, or the whole datagram if it is shorter.
pub fn time_exceeded(original: &[u8]) -> Vec<u8> {
    let quote = &original[..original.len().min(ICMP_QUOTE_LEN)];

    let mut message = Vec::with_capacity(ICMP_HEADER_LEN + quote.len());
    message.extend_from_slice(&[ICMP_TIME_EXCEEDED, ICMP_TTL_EXPIRED, 0, 0, 0, 0, 0, 0]);
    message.extend_from_slice(quote);

    let sum = checksum::internet(&message);
    NetworkEndian::write_u16(&mut message[2..4], sum);
    message
}
