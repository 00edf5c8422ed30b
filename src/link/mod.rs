//! Link layer: SLIP framing over arbitrary byte channels.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Network Layer                │
//! ├─────────────────────────────────────────┤
//! │   LinkLayer (peer address → link)       │  ← This module
//! │   SlipCodec per link                    │
//! ├─────────────────────────────────────────┤
//! │   PhysicalLink (serial, pipe, socket)   │
//! └─────────────────────────────────────────┘
//! ```

mod multiplexer;
mod physical;
mod slip;

pub use multiplexer::{DatagramLink, LinkLayer};
pub use physical::PhysicalLink;
pub use slip::SlipCodec;
