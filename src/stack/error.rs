//! Stack-level error type.

use std::io;

use thiserror::Error;

use crate::core::{LinkError, NetworkError};
use crate::transport::TransportError;

/// Errors surfaced by [`Stack`](super::Stack) and the driver.
#[derive(Debug, Error)]
pub enum StackError {
    /// Link layer error.
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    /// Network layer error.
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    /// Transport layer error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Operation not valid for the current configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}
