//! Credential parsing.
//!
//! A credential is one opaque string handed to the game by its backend.
//! The engine needs two things from it:
//!
//! 1. The **token**: the string's UTF-8 bytes, sent verbatim in the
//!    Authenticate frame.
//! 2. The **application id**, used to ask discovery for an endpoint.
//!
//! The id is recovered from nested base64 key pairs:
//!
//! ```text
//!   base64("provider:" + base64("developer:" + base64("app:" + base64("user:" + secret))))
//! ```
//!
//! Each layer decodes to `key:rest`; the key is collected and `rest` is
//! decoded next. Parsing stops quietly at the first layer that is not
//! base64 or has no `key:rest` split. A malformed credential therefore
//! produces an empty application id instead of an error, and the session
//! rejects it at `start`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// A parsed credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: Vec<u8>,
    access_keys: Vec<String>,
}

/// Never print the token.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token_len", &self.token.len())
            .field("access_keys", &self.access_keys)
            .finish()
    }
}

impl Credential {
    /// Parses a credential string. Never fails; see the module docs.
    pub fn parse(raw: &str) -> Self {
        let mut access_keys = Vec::new();
        let mut rest = raw.to_string();
        while !rest.is_empty() {
            let Some((key, secret)) = split_key_pair(&rest) else {
                break;
            };
            access_keys.push(key);
            rest = secret;
        }
        tracing::debug!(keys = access_keys.len(), "credential parsed");
        Self {
            token: raw.as_bytes().to_vec(),
            access_keys,
        }
    }

    /// Bytes sent in the Authenticate frame.
    pub fn token(&self) -> &[u8] {
        &self.token
    }

    pub fn provider(&self) -> &str {
        self.key(0)
    }

    pub fn developer(&self) -> &str {
        self.key(1)
    }

    pub fn app_name(&self) -> &str {
        self.key(2)
    }

    pub fn user_id(&self) -> &str {
        self.key(3)
    }

    fn key(&self, index: usize) -> &str {
        self.access_keys.get(index).map_or("", String::as_str)
    }

    /// `base64("provider:developer:app")`, or empty if any part is missing.
    pub fn app_id(&self) -> String {
        let (provider, developer, app) = (self.provider(), self.developer(), self.app_name());
        if provider.is_empty() || developer.is_empty() || app.is_empty() {
            return String::new();
        }
        STANDARD.encode(format!("{provider}:{developer}:{app}"))
    }
}

/// Decodes one base64 layer into `(key, rest)`.
///
/// `None` if the layer is not base64, has no `:`, or has nothing after it.
fn split_key_pair(layer: &str) -> Option<(String, String)> {
    let decoded = STANDARD.decode(layer).ok()?;
    let colon = decoded.iter().position(|&b| b == b':')?;
    if colon + 1 >= decoded.len() {
        return None;
    }
    let key = String::from_utf8_lossy(&decoded[..colon]).into_owned();
    let rest = String::from_utf8_lossy(&decoded[colon + 1..]).into_owned();
    Some((key, rest))
}
