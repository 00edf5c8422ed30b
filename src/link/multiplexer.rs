//! Link multiplexer: one SLIP engine per configured peer.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use tracing::trace;

use super::physical::PhysicalLink;
use super::slip::SlipCodec;
use crate::core::LinkError;

/// Narrow send interface the network layer forwards through.
pub trait DatagramLink {
    /// Transmit `datagram` to the directly attached `next_hop`.
    fn send_datagram(&mut self, datagram: &[u8], next_hop: Ipv4Addr) -> Result<(), LinkError>;
}

/// A physical link and the framing engine in front of it.
#[derive(Debug)]
struct Link<P> {
    physical: P,
    codec: SlipCodec,
}

/// Registry of physical links keyed by the address of the peer at the far end.
///
/// The registry is fixed at construction. Every engine's decoded datagrams
/// are returned to the single owner through [`LinkLayer::receive`].
#[derive(Debug)]
pub struct LinkLayer<P> {
    links: HashMap<Ipv4Addr, Link<P>>,
}

impl<P: PhysicalLink> LinkLayer<P> {
    /// Create the registry from `(peer address, physical link)` pairs.
    pub fn new<I>(links: I) -> Self
    where
        I: IntoIterator<Item = (Ipv4Addr, P)>,
    {
        let links = links
            .into_iter()
            .map(|(peer, physical)| {
                (
                    peer,
                    Link {
                        physical,
                        codec: SlipCodec::new(),
                    },
                )
            })
            .collect();
        Self { links }
    }

    /// Frame `datagram` and write it to the link reaching `next_hop`.
    pub fn send(&mut self, datagram: &[u8], next_hop: Ipv4Addr) -> Result<(), LinkError> {
        let link = self
            .links
            .get_mut(&next_hop)
            .ok_or(LinkError::UnknownNextHop(next_hop))?;

        let frame = SlipCodec::encode(datagram);
        trace!(%next_hop, len = datagram.len(), "sending frame");
        link.physical.send(&frame)?;
        Ok(())
    }

    /// Feed bytes read from the link to `peer` and return completed datagrams.
    pub fn receive(&mut self, peer: Ipv4Addr, bytes: &[u8]) -> Result<Vec<Vec<u8>>, LinkError> {
        let link = self
            .links
            .get_mut(&peer)
            .ok_or(LinkError::UnknownPeer(peer))?;
        Ok(link.codec.decode(bytes))
    }

    /// Addresses of all configured peers.
    pub fn peers(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.links.keys().copied()
    }

    /// The physical link reaching `peer`.
    pub fn physical(&self, peer: Ipv4Addr) -> Option<&P> {
        self.links.get(&peer).map(|link| &link.physical)
    }

    /// Mutable access to the physical link reaching `peer`.
    pub fn physical_mut(&mut self, peer: Ipv4Addr) -> Option<&mut P> {
        self.links.get_mut(&peer).map(|link| &mut link.physical)
    }
}

impl<P: PhysicalLink> DatagramLink for LinkLayer<P> {
    fn send_datagram(&mut self, datagram: &[u8], next_hop: Ipv4Addr) -> Result<(), LinkError> {
        self.send(datagram, next_hop)
    }
}
