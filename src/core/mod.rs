//! Constants and error types shared across layers.

pub mod constants;
mod error;

pub use error::*;
