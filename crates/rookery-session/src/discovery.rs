//! Endpoint discovery.
//!
//! Before connecting, the session asks a [`Discovery`] collaborator where
//! the realtime server for its application lives. The real service is an
//! HTTP lookup at [`lookup_url`]; performing that request is left to the
//! embedding application (it owns the HTTP stack). The engine only needs
//! the answer, a [`ServerDescriptor`].

use serde::{Deserialize, Serialize};

use crate::SessionError;
use crate::config::{Environment, Region};

/// Where to connect, as returned by the discovery service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    #[serde(default)]
    pub scheme: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub options: String,
}

impl ServerDescriptor {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: "udp".into(),
            host: host.into(),
            port,
            key: String::new(),
            options: String::new(),
        }
    }

    /// Parses the discovery service's JSON response body.
    pub fn from_json(body: &str) -> Result<Self, SessionError> {
        serde_json::from_str(body).map_err(SessionError::InvalidDescriptor)
    }
}

/// Resolves an application id to at most one endpoint.
///
/// `Ok(None)` means "asked successfully, no endpoint". The session treats
/// both that and `Err` as fatal at start.
pub trait Discovery {
    fn lookup(&mut self, app_id: &str) -> Result<Option<ServerDescriptor>, SessionError>;
}

/// A [`Discovery`] that always answers with the same descriptor.
///
/// Useful for local servers, tests, and deployments where the endpoint
/// is known ahead of time.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    descriptor: Option<ServerDescriptor>,
}

impl StaticDiscovery {
    pub fn new(descriptor: ServerDescriptor) -> Self {
        Self {
            descriptor: Some(descriptor),
        }
    }

    /// A discovery that never finds anything.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl Discovery for StaticDiscovery {
    fn lookup(&mut self, app_id: &str) -> Result<Option<ServerDescriptor>, SessionError> {
        tracing::debug!(app_id, found = self.descriptor.is_some(), "static discovery lookup");
        Ok(self.descriptor.clone())
    }
}

impl<F> Discovery for F
where
    F: FnMut(&str) -> Result<Option<ServerDescriptor>, SessionError>,
{
    fn lookup(&mut self, app_id: &str) -> Result<Option<ServerDescriptor>, SessionError> {
        self(app_id)
    }
}

/// Base URL of the discovery service for an environment and region.
pub fn base_url(environment: Environment, region: Region) -> &'static str {
    match (environment, region) {
        (Environment::Playground, _) => "http://central.playground.hayabusa-cloud.link",
        (Environment::Production, Region::Jp) => "https://central.jp.prd.hayabusa-cloud.link",
    }
}

/// `{base}/v1/realtime/{app_id}?opt1&opt2...`
pub fn lookup_url(
    environment: Environment,
    region: Region,
    app_id: &str,
    options: &[&str],
) -> String {
    let mut url = format!("{}/v1/realtime/{app_id}", base_url(environment, region));
    if !options.is_empty() {
        url.push('?');
        url.push_str(&options.join("&"));
    }
    url
}
