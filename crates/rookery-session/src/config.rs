//! Client configuration.
//!
//! Every field has a default, so an empty JSON object (or
//! `ClientConfig::default()`) is a valid configuration. Override only
//! what you need:
//!
//! ```rust
//! use rookery_session::{ClientConfig, Environment};
//!
//! let config = ClientConfig::from_json(r#"{ "environment": "playground" }"#).unwrap();
//! assert_eq!(config.environment, Environment::Playground);
//! assert_eq!(config.default_heartbeat_secs, 1);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::SessionError;

/// Which discovery deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    /// Trial environment with relaxed limits.
    Playground,
}

/// Service region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// Northeast Asia (Tokyo).
    #[default]
    Jp,
}

/// Tunables for one client session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Heartbeat interval in seconds until the server sends its own.
    /// Default: 1.
    pub default_heartbeat_secs: u64,

    /// Connect here instead of the discovered host (keeps the discovered
    /// port). Handy for pointing a build at a local server.
    pub host_override: Option<String>,

    /// Discovery deployment. Default: production.
    pub environment: Environment,

    /// Service region. Default: Jp.
    pub region: Region,

    /// Upper bound on bytes requested from the transport per receive call.
    /// Default: 1024.
    pub receive_chunk: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_heartbeat_secs: 1,
            host_override: None,
            environment: Environment::default(),
            region: Region::default(),
            receive_chunk: 1024,
        }
    }
}

impl ClientConfig {
    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        let config: Self = serde_json::from_str(json).map_err(SessionError::InvalidConfig)?;
        Ok(config.validated())
    }

    /// Fixes out-of-range values so the config is safe to use.
    ///
    /// - `default_heartbeat_secs` of 0 becomes 1 (0 would heartbeat every tick).
    /// - `receive_chunk` of 0 becomes 1 (0 could never make progress).
    pub fn validated(mut self) -> Self {
        if self.default_heartbeat_secs == 0 {
            warn!("default_heartbeat_secs is 0, using 1");
            self.default_heartbeat_secs = 1;
        }
        if self.receive_chunk == 0 {
            warn!("receive_chunk is 0, using 1");
            self.receive_chunk = 1;
        }
        self
    }

    pub fn default_heartbeat(&self) -> Duration {
        Duration::from_secs(self.default_heartbeat_secs)
    }
}
