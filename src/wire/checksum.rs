//! RFC 1071 internet checksum.

use std::net::Ipv4Addr;

use byteorder::{ByteOrder, NetworkEndian};

fn propagate_carries(word: u32) -> u16 {
    let sum = (word >> 16) + (word & 0xffff);
    ((sum >> 16) as u16) + (sum as u16)
}

/// Ones'-complement sum of `data` taken as big-endian 16-bit words.
///
/// This is the sum *without* the final complement, so partial sums can be
/// combined with [`combine`].
pub fn data(mut data: &[u8]) -> u16 {
    let mut accum: u32 = 0;

    while data.len() >= 2 {
        accum += NetworkEndian::read_u16(data) as u32;
        data = &data[2..];
    }

    // An odd trailing byte is padded with zero on the right.
    if let Some(&value) = data.first() {
        accum += (value as u32) << 8;
    }

    propagate_carries(accum)
}

/// Combine several partial sums.
pub fn combine(checksums: &[u16]) -> u16 {
    let mut accum: u32 = 0;
    for &word in checksums {
        accum += word as u32;
    }
    propagate_carries(accum)
}

/// Partial sum of the IPv4 pseudo-header used by TCP.
pub fn pseudo_header(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, length: u16) -> u16 {
    let mut proto_len = [0u8; 4];
    proto_len[1] = protocol;
    NetworkEndian::write_u16(&mut proto_len[2..4], length);

    combine(&[
        data(&src.octets()),
        data(&dst.octets()),
        data(&proto_len),
    ])
}

/// Checksum value to store in a header: the complement of the sum.
pub fn internet(bytes: &[u8]) -> u16 {
    !data(bytes)
}

/// Whether `bytes`, checksum field included, sums to all ones.
pub fn verify(bytes: &[u8]) -> bool {
    data(bytes) == 0xffff
}
