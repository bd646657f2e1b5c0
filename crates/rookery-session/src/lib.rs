//! Session plumbing for Rookery.
//!
//! Everything a client needs before and around its connection, but not
//! the connection itself:
//!
//! - [`Credential`]: parses the opaque credential string into the token
//!   sent at authentication and the application id used for discovery.
//! - [`Discovery`] / [`ServerDescriptor`]: where the realtime server is.
//! - [`ClientConfig`]: serde-loadable tunables with defaults.
//! - [`Heartbeat`] / [`SessionState`]: lifecycle and liveness bookkeeping.

mod config;
mod credential;
mod discovery;
mod error;
mod heartbeat;
mod session;

pub use config::{ClientConfig, Environment, Region};
pub use credential::Credential;
pub use discovery::{Discovery, ServerDescriptor, StaticDiscovery, base_url, lookup_url};
pub use error::SessionError;
pub use heartbeat::Heartbeat;
pub use session::{Phase, SessionState};
