//! Network node: host/router role decision, forwarding and origination.

use std::net::Ipv4Addr;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, trace, warn};

use super::route::ForwardingTable;
use crate::core::NetworkError;
use crate::core::constants::{IPPROTO_ICMP, IPPROTO_TCP, IPV4_HEADER_LEN};
use crate::link::DatagramLink;
use crate::wire::{Ipv4Header, icmp, verify_header_checksum};

/// A transport payload addressed to this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Source address of the datagram.
    pub src: Ipv4Addr,
    /// Destination address (the local address).
    pub dst: Ipv4Addr,
    /// The TCP segment.
    pub payload: Vec<u8>,
}

/// One IPv4 node. Acts as host for its own address and as router for every
/// other destination.
#[derive(Debug)]
pub struct Node {
    local_addr: Ipv4Addr,
    table: ForwardingTable,
    ignore_checksum: bool,
    rng: StdRng,
}

impl Node {
    /// Create a node with an empty forwarding table.
    pub fn new(local_addr: Ipv4Addr) -> Self {
        Self {
            local_addr,
            table: ForwardingTable::default(),
            ignore_checksum: false,
            rng: StdRng::from_entropy(),
        }
    }

    /// Skip header checksum validation on receive.
    pub fn with_ignore_checksum(mut self, ignore: bool) -> Self {
        self.ignore_checksum = ignore;
        self
    }

    /// Use a deterministic identification sequence.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// The address this node answers to.
    pub fn local_addr(&self) -> Ipv4Addr {
        self.local_addr
    }

    /// Current forwarding table.
    pub fn table(&self) -> &ForwardingTable {
        &self.table
    }

    /// Replace the forwarding table as a whole.
    pub fn set_table(&mut self, table: ForwardingTable) {
        debug!(routes = table.len(), "forwarding table replaced");
        self.table = table;
    }

    /// Next hop for `dst` by longest-prefix match.
    pub fn next_hop(&self, dst: Ipv4Addr) -> Result<Ipv4Addr, NetworkError> {
        self.table.lookup(dst).ok_or(NetworkError::NoRoute(dst))
    }

    /// Originate a datagram carrying `payload` to `dst`.
    pub fn send<L>(
        &mut self,
        link: &mut L,
        payload: &[u8],
        dst: Ipv4Addr,
        protocol: u8,
    ) -> Result<(), NetworkError>
    where
        L: DatagramLink + ?Sized,
    {
        let next_hop = self.next_hop(dst)?;
        let ident = self.rng.next_u32() as u16;
        let header = Ipv4Header::new(self.local_addr, dst, protocol, ident, payload.len());
        trace!(%dst, %next_hop, protocol, len = payload.len(), "originating datagram");
        link.send_datagram(&header.emit(payload), next_hop)?;
        Ok(())
    }

    /// Process one inbound datagram.
    ///
    /// Returns the payload when this node is the destination and the payload
    /// is TCP. Everything else is forwarded, answered with ICMP, or dropped.
    pub fn receive<L>(
        &mut self,
        link: &mut L,
        datagram: &[u8],
    ) -> Result<Option<Delivery>, NetworkError>
    where
        L: DatagramLink + ?Sized,
    {
        let (header, payload) = match Ipv4Header::from_bytes(datagram) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(error = %e, len = datagram.len(), "dropping malformed datagram");
                return Ok(None);
            }
        };

        if !self.ignore_checksum && !verify_header_checksum(datagram) {
            warn!(src = %header.src, dst = %header.dst, "dropping datagram with bad header checksum");
            return Ok(None);
        }

        if header.dst == self.local_addr {
            if header.protocol != IPPROTO_TCP {
                debug!(src = %header.src, protocol = header.protocol, "dropping unsupported protocol");
                return Ok(None);
            }
            return Ok(Some(Delivery {
                src: header.src,
                dst: header.dst,
                payload: payload.to_vec(),
            }));
        }

        if header.ttl <= 1 {
            debug!(src = %header.src, dst = %header.dst, "ttl expired in transit");
            let message = icmp::time_exceeded(datagram);
            self.send(link, &message, header.src, IPPROTO_ICMP)?;
            return Ok(None);
        }

        let next_hop = self.next_hop(header.dst)?;
        // Options are not re-emitted, so the total length shrinks with them.
        let forwarded = Ipv4Header {
            total_len: (IPV4_HEADER_LEN + payload.len()) as u16,
            flags_frag: 0,
            ttl: header.ttl - 1,
            ..header
        };
        trace!(src = %header.src, dst = %header.dst, %next_hop, ttl = forwarded.ttl, "forwarding");
        link.send_datagram(&forwarded.emit(payload), next_hop)?;
        Ok(None)
    }
}
