//! # slipstack
//!
//! A minimal three-layer network stack for byte-oriented links:
//!
//! - **Link**: SLIP framing (RFC 1055), one engine per physical link
//! - **Network**: IPv4 host and router with longest-prefix-match forwarding,
//!   TTL handling and ICMP Time Exceeded
//! - **Transport**: a passive-open TCP subset with cumulative acknowledgment,
//!   RFC 6298 retransmission timeouts and a congestion window
//!
//! The stack runs over anything that moves bytes (a serial line, a pipe, a
//! socket) and speaks standard IPv4/TCP on the wire.
//!
//! ## Feature Flags
//!
//! - `runtime` (default): tokio [`stack::Driver`], channel links and stream pumps
//!
//! ## Modules
//!
//! - [`core`]: Constants and error types shared by the layers
//! - [`wire`]: IPv4, TCP and ICMP header codecs, checksums, CIDR prefixes
//! - [`link`]: SLIP codec and link multiplexer
//! - [`network`]: Forwarding table and IPv4 node
//! - [`transport`]: Server, connection state machine, RTT estimation
//! - [`stack`]: The layers wired together, plus the async driver
//!
//! ## Example Usage
//!
//! ```rust
//! use std::net::Ipv4Addr;
//! use std::time::Instant;
//!
//! use slipstack::prelude::*;
//!
//! let peer = Ipv4Addr::new(10, 0, 0, 2);
//! let config = StackBuilder::new()
//!     .local_addr(Ipv4Addr::new(10, 0, 0, 1))
//!     .route("10.0.0.0/24".parse().unwrap(), peer)
//!     .build();
//!
//! // A Vec<u8> is a physical link that just collects outbound bytes.
//! let mut stack: Stack<Vec<u8>> = Stack::new(config, [(peer, Vec::new())]);
//! stack
//!     .listen(
//!         TransportBuilder::new().port(80).build(),
//!         |id: ConnectionId| println!("accepted {id}"),
//!         |id: ConnectionId, data: &[u8]| println!("{id}: {} bytes", data.len()),
//!     )
//!     .unwrap();
//!
//! // Bytes read from the peer's link go in; replies come out on its link.
//! stack.on_bytes(peer, &[0xc0, 0xc0], Instant::now()).unwrap();
//! assert!(stack.link().physical(peer).unwrap().is_empty());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod core;
pub mod link;
pub mod network;
pub mod stack;
pub mod transport;
pub mod wire;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    pub use crate::link::{LinkLayer, PhysicalLink, SlipCodec};
    pub use crate::network::{ForwardingTable, Node, Route};
    pub use crate::stack::{Stack, StackBuilder, StackConfig, StackError};
    pub use crate::transport::{
        AcceptObserver, ConnectionId, ConnectionPhase, DataObserver, Server, TransportBuilder,
        TransportConfig, TransportError,
    };
    pub use crate::wire::Ipv4Cidr;

    #[cfg(feature = "runtime")]
    pub use crate::stack::{ChannelLink, Driver, DriverHandle, channel_link, spawn_stream_link};
}

// Re-export commonly used items at crate root
pub use crate::core::{CidrError, LinkError, NetworkError, WireError};
pub use crate::stack::{Stack, StackBuilder, StackError};
pub use crate::transport::{ConnectionId, Server, TransportBuilder, TransportError};
