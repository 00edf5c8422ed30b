//! Transport layer: a passive-open TCP subset.
//!
//! It provides:
//!
//! - **Server**: [`Server`] listens on one port, answers SYNs and demultiplexes
//!   by 4-tuple
//! - **Connection state machine**: [`Connection`] with in-order delivery,
//!   cumulative acknowledgment and a congestion window
//! - **RTT estimation**: [`RttEstimator`] after RFC 6298
//! - **Retransmission timer**: [`RetransmitTimer`], a per-connection deadline
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   Application (AcceptObserver,          │
//! │                DataObserver)            │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   demux, cwnd, RTO, retransmission      │
//! ├─────────────────────────────────────────┤
//! │         Network Layer (NetworkSend)     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! There is no active open, no half-close and no reset. A FIN from either
//! side closes the connection after one FIN exchange.

mod connection;
mod error;
mod server;
mod timer;
mod timing;

pub use connection::{Connection, ConnectionId, ConnectionPhase, OutstandingSegment};
pub use error::{TransportError, TransportResult};
pub use server::{AcceptObserver, DataObserver, Server, TransportBuilder, TransportConfig};
pub use timer::RetransmitTimer;
pub use timing::{RttEstimator, constants as timing_constants};
