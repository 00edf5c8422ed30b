//! Error types shared by the link and network layers.

use std::io;
use std::net::Ipv4Addr;

use thiserror::Error;

/// Errors that can occur when parsing a header off the wire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Buffer is shorter than the header it should contain.
    #[error("buffer too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum expected size.
        expected: usize,
        /// Actual size received.
        actual: usize,
    },

    /// IP version is not 4.
    #[error("unsupported ip version: {0}")]
    UnsupportedVersion(u8),

    /// IHL field below the minimum of five words.
    #[error("invalid ip header length: {0} words")]
    BadHeaderLength(u8),

    /// Total length field disagrees with the buffer.
    #[error("total length {declared} does not fit buffer of {actual} bytes")]
    BadTotalLength {
        /// Length announced by the header.
        declared: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// TCP data offset points outside the segment.
    #[error("invalid tcp data offset: {0} words")]
    BadDataOffset(u8),
}

/// Errors that can occur when parsing a CIDR prefix.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CidrError {
    /// Text is not of the form `a.b.c.d/n`.
    #[error("invalid cidr notation: {0:?}")]
    InvalidFormat(String),

    /// Prefix length exceeds 32 bits.
    #[error("prefix length {0} exceeds 32")]
    PrefixTooLong(u8),
}

/// Errors in the link layer.
#[derive(Debug, Error)]
pub enum LinkError {
    /// No physical link is registered for the next hop.
    #[error("no link registered for next hop {0}")]
    UnknownNextHop(Ipv4Addr),

    /// Bytes arrived for a peer that has no registered link.
    #[error("no link registered for peer {0}")]
    UnknownPeer(Ipv4Addr),

    /// Physical link write failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Errors in the network layer.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// No forwarding table entry matches the destination.
    #[error("no route to {0}")]
    NoRoute(Ipv4Addr),

    /// Link layer error.
    #[error("link error: {0}")]
    Link(#[from] LinkError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_address() {
        let addr = Ipv4Addr::new(10, 0, 0, 1);
        assert_eq!(
            NetworkError::NoRoute(addr).to_string(),
            "no route to 10.0.0.1"
        );
        assert_eq!(
            LinkError::UnknownNextHop(addr).to_string(),
            "no link registered for next hop 10.0.0.1"
        );
    }

    #[test]
    fn test_link_error_converts_into_network_error() {
        let err: NetworkError = LinkError::UnknownNextHop(Ipv4Addr::LOCALHOST).into();
        assert!(matches!(
            err,
            NetworkError::Link(LinkError::UnknownNextHop(_))
        ));
    }
}
