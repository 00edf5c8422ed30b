//! A complete node: link, network and transport layers behind one facade.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   Driver (tokio, feature "runtime")     │
//! ├─────────────────────────────────────────┤
//! │   Stack                                 │  ← This module
//! │   ├─ Server   (transport)               │
//! │   ├─ Node     (network)                 │
//! │   └─ LinkLayer (SLIP per peer)          │
//! ├─────────────────────────────────────────┤
//! │   PhysicalLink / ChannelLink            │
//! └─────────────────────────────────────────┘
//! ```
//!
//! [`Stack`] is synchronous and clock-agnostic: callers pass `now` into every
//! entry point. [`Driver`] runs it on tokio, sleeping until the next
//! retransmission deadline.

mod config;
mod error;
#[allow(clippy::module_inception)]
mod stack;

#[cfg(feature = "runtime")]
mod driver;

pub use config::{StackBuilder, StackConfig};
pub use error::StackError;
pub use stack::Stack;

#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub use driver::{ChannelLink, Command, Driver, DriverHandle, channel_link, spawn_stream_link};
