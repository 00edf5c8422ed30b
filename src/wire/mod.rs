//! Header codecs for the protocols the stack speaks.
//!
//! - [`Ipv4Header`]: fixed 20-byte IPv4 header with header checksum
//! - [`TcpHeader`] and [`TcpFlags`]: TCP header with pseudo-header checksum
//! - [`icmp`]: ICMP Time Exceeded generation
//! - [`Ipv4Cidr`]: address prefixes for the forwarding table
//! - [`checksum`]: RFC 1071 ones'-complement arithmetic

pub mod checksum;
mod cidr;
pub mod icmp;
mod ipv4;
mod tcp;

pub use cidr::Ipv4Cidr;
pub use icmp::IcmpHeader;
pub use ipv4::{Ipv4Header, verify_header_checksum};
pub use tcp::{TcpFlags, TcpHeader, verify_checksum as verify_tcp_checksum};
