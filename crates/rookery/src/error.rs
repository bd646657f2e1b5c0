//! Unified error type for the Rookery client.

use rookery_dispatch::DispatchError;
use rookery_protocol::ProtocolError;
use rookery_session::SessionError;
use rookery_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// `Client` methods return this, so callers match on one type. Each
/// variant is transparent and `?` converts sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum RookeryError {
    /// Connect, send, or receive failed. A stalled write lands here.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A packet could not be encoded (overflow, oversized field).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A registration was rejected.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Credential, discovery, or lifecycle problem.
    #[error(transparent)]
    Session(#[from] SessionError),
}
