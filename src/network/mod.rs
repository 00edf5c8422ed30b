//! Network layer: IPv4 host and router.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Transport Layer              │
//! ├─────────────────────────────────────────┤
//! │   Node (host / router role)             │  ← This module
//! │   ForwardingTable (longest prefix)      │
//! ├─────────────────────────────────────────┤
//! │            Link Layer                   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Datagrams for the local address go up as a [`Delivery`]. Everything else
//! is forwarded with its TTL decremented, or answered with ICMP Time Exceeded
//! once the TTL runs out.

mod node;
mod route;

use std::net::Ipv4Addr;

pub use node::{Delivery, Node};
pub use route::{ForwardingTable, Route};

use crate::core::NetworkError;
use crate::link::DatagramLink;

/// Send interface the transport layer originates segments through.
pub trait NetworkSend {
    /// Wrap `payload` in an IPv4 header and route it to `dst`.
    fn send(&mut self, payload: &[u8], dst: Ipv4Addr, protocol: u8) -> Result<(), NetworkError>;
}

/// A node paired with the link it transmits on.
pub struct NodeSender<'a, L: ?Sized> {
    node: &'a mut Node,
    link: &'a mut L,
}

impl<'a, L: DatagramLink + ?Sized> NodeSender<'a, L> {
    /// Borrow `node` and `link` for the duration of one event.
    pub fn new(node: &'a mut Node, link: &'a mut L) -> Self {
        Self { node, link }
    }
}

impl<L: DatagramLink + ?Sized> NetworkSend for NodeSender<'_, L> {
    fn send(&mut self, payload: &[u8], dst: Ipv4Addr, protocol: u8) -> Result<(), NetworkError> {
        self.node.send(&mut *self.link, payload, dst, protocol)
    }
}
