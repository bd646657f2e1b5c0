//! Error types for the dispatch layer.

use rookery_protocol::ProtocolError;

/// Errors from registering or running handlers.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A handler failed to decode its frame body.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Middleware levels run from 0 (every code) to 16 (one exact code).
    #[error("middleware level {0} is outside 0..=16")]
    InvalidLevel(u8),

    /// The dispatch table was already built; it is immutable from then on.
    #[error("dispatch table is already built; registration rejected")]
    Sealed,

    /// An application handler reported a failure.
    #[error("handler failed: {0}")]
    Handler(String),
}
