//! Transport layer error types.
//!
//! Most inbound failures are dropped and logged by the server; only routing
//! failures while replying and application misuse reach the caller.

use thiserror::Error;

use super::connection::ConnectionId;
use crate::core::{NetworkError, WireError};

/// Transport layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Segment header could not be parsed.
    #[error("malformed segment: {0}")]
    Malformed(#[from] WireError),

    /// Segment addressed to a port nobody listens on.
    #[error("segment for port {0}, not the bound port")]
    WrongPort(u16),

    /// Pseudo-header checksum did not verify.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// No live connection for the 4-tuple.
    #[error("segment for unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// Reply could not be routed or framed.
    #[error("network error: {0}")]
    Network(#[from] NetworkError),
}

impl TransportError {
    /// Check if this error is dropped and logged rather than returned.
    pub fn is_silent_drop(&self) -> bool {
        matches!(
            self,
            TransportError::Malformed(_)
                | TransportError::WrongPort(_)
                | TransportError::ChecksumMismatch
                | TransportError::UnknownConnection(_)
        )
    }

    /// Check if this drop points at a misbehaving or confused peer.
    pub fn is_suspicious(&self) -> bool {
        matches!(
            self,
            TransportError::ChecksumMismatch | TransportError::UnknownConnection(_)
        )
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
