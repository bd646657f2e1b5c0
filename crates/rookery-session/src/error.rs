//! Error types for the session layer.

/// Errors that can occur while setting up or running a session.
///
/// These cover everything before the first byte is sent (credential,
/// discovery, configuration) plus the session lifecycle itself.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The credential string did not yield provider, developer and
    /// application keys, so there is no application id to look up.
    #[error("credential does not identify an application")]
    InvalidCredential,

    /// Discovery answered, but with no endpoint for this application.
    #[error("no realtime endpoint found for application {app_id}")]
    EndpointNotFound { app_id: String },

    /// The discovery collaborator itself failed.
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// A server descriptor could not be parsed.
    #[error("invalid server descriptor: {0}")]
    InvalidDescriptor(#[source] serde_json::Error),

    /// A configuration document could not be parsed.
    #[error("invalid client config: {0}")]
    InvalidConfig(#[source] serde_json::Error),

    /// `start` was called on a session that already started (or stopped).
    #[error("session already started")]
    AlreadyStarted,

    /// The operation needs a started session.
    #[error("session is not connected")]
    NotConnected,
}
