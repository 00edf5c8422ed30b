//! Protocol constants.
//!
//! Values fixed by RFC 1055 (SLIP), RFC 791 (IPv4), RFC 792 (ICMP) and
//! RFC 793 (TCP), plus the stack's own defaults.

use std::time::Duration;

// =============================================================================
// SLIP FRAMING (RFC 1055)
// =============================================================================

/// Frame delimiter.
pub const SLIP_END: u8 = 0xC0;

/// Escape byte.
pub const SLIP_ESC: u8 = 0xDB;

/// Substitute code for an escaped `SLIP_END`.
pub const SLIP_ESC_END: u8 = 0xDC;

/// Substitute code for an escaped `SLIP_ESC`.
pub const SLIP_ESC_ESC: u8 = 0xDD;

// =============================================================================
// IPV4 (RFC 791)
// =============================================================================

/// IP version carried in the header.
pub const IPV4_VERSION: u8 = 4;

/// Size of an IPv4 header without options.
pub const IPV4_HEADER_LEN: usize = 20;

/// TTL of locally originated datagrams.
pub const DEFAULT_TTL: u8 = 64;

/// Protocol number of ICMP.
pub const IPPROTO_ICMP: u8 = 1;

/// Protocol number of TCP.
pub const IPPROTO_TCP: u8 = 6;

// =============================================================================
// ICMP (RFC 792)
// =============================================================================

/// ICMP type: time exceeded.
pub const ICMP_TIME_EXCEEDED: u8 = 11;

/// ICMP time-exceeded code: TTL expired in transit.
pub const ICMP_TTL_EXPIRED: u8 = 0;

/// ICMP header size (type, code, checksum, unused).
pub const ICMP_HEADER_LEN: usize = 8;

/// Bytes of the offending datagram quoted in an ICMP error.
pub const ICMP_QUOTE_LEN: usize = IPV4_HEADER_LEN + 8;

// =============================================================================
// TCP (RFC 793)
// =============================================================================

/// Size of a TCP header without options.
pub const TCP_HEADER_LEN: usize = 20;

/// Default maximum segment size.
pub const DEFAULT_MSS: usize = 1460;

/// Largest payload whose IPv4 and TCP length fields still fit in 16 bits.
pub const MAX_MSS: usize = u16::MAX as usize - IPV4_HEADER_LEN - TCP_HEADER_LEN;

/// Receive window advertised in every segment.
pub const DEFAULT_WINDOW: u16 = u16::MAX;

// =============================================================================
// TIMING
// =============================================================================

/// Retransmission timeout before the first RTT sample.
pub const INITIAL_RTO: Duration = Duration::from_millis(1000);

/// Lower bound on the retransmission timeout.
pub const MIN_RTO: Duration = Duration::from_millis(10);

/// Upper bound on the retransmission timeout.
pub const MAX_RTO: Duration = Duration::from_millis(60000);
