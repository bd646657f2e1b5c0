/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer closed the connection.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Resolving or connecting to the remote endpoint failed.
    #[error("connect to {endpoint} failed: {source}")]
    ConnectFailed {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The transport accepted zero bytes of a pending write.
    ///
    /// The send loop treats this as unrecoverable: retrying would spin
    /// forever against a transport that has stopped draining.
    #[error("transport accepted 0 of {remaining} remaining bytes")]
    WriteStalled { remaining: usize },

    /// An operation needed a connection but none was established.
    #[error("transport is not connected")]
    NotConnected,
}
