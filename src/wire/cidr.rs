//! IPv4 CIDR prefixes, relevant rfc1519, rfc4632.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::core::CidrError;

/// An IPv4 address prefix such as `10.1.0.0/16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    address: Ipv4Addr,
    prefix_len: u8,
}

impl Ipv4Cidr {
    /// Create a prefix, rejecting lengths above 32.
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Result<Self, CidrError> {
        if prefix_len > 32 {
            return Err(CidrError::PrefixTooLong(prefix_len));
        }
        Ok(Self {
            address,
            prefix_len,
        })
    }

    /// The prefix that matches every address.
    pub fn any() -> Self {
        Self {
            address: Ipv4Addr::UNSPECIFIED,
            prefix_len: 0,
        }
    }

    /// The address part as configured.
    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// Number of leading bits that define the network.
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Network mask as an integer in host order.
    pub fn netmask(&self) -> u32 {
        // A shift by 32 would overflow.
        match self.prefix_len {
            0 => 0,
            len => u32::MAX << (32 - len as u32),
        }
    }

    /// Whether the first `prefix_len` bits of `addr` equal those of the prefix.
    ///
    /// Host bits set in the configured address are ignored.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let mask = self.netmask();
        u32::from(self.address) & mask == u32::from(addr) & mask
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = CidrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CidrError::InvalidFormat(s.to_string());

        let (address, prefix_len) = s.split_once('/').ok_or_else(invalid)?;
        let address: Ipv4Addr = address.trim().parse().map_err(|_| invalid())?;
        let prefix_len: u8 = prefix_len.trim().parse().map_err(|_| invalid())?;

        Self::new(address, prefix_len)
    }
}
