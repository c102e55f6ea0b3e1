// ── Relay server settings ──

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default frps control port.
pub const DEFAULT_CONTROL_PORT: u16 = 7000;

fn default_control_port() -> u16 {
    DEFAULT_CONTROL_PORT
}

fn default_enabled() -> bool {
    true
}

/// Connection details for the public relay (frps) that terminates tunnels.
///
/// At most one is stored. The tunnel manager only reads it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayServerConfig {
    /// Relay hostname or IP, as dialled by the tunnel client.
    pub host: String,
    /// Control port the tunnel client logs in on.
    #[serde(default = "default_control_port")]
    pub port: u16,
    /// Shared-secret auth token; `None` when the relay runs without auth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Host viewers use, when it differs from `host` (e.g. behind a
    /// load balancer).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_host: Option<String>,
}

impl RelayServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            token: None,
            enabled: true,
            public_host: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_public_host(mut self, host: impl Into<String>) -> Self {
        self.public_host = Some(host.into());
        self
    }

    /// The host embedded in stream URLs.
    pub fn public_host(&self) -> &str {
        self.public_host
            .as_deref()
            .filter(|h| !h.is_empty())
            .unwrap_or(&self.host)
    }
}

impl fmt::Debug for RelayServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("token", &self.token.as_ref().map(|_| "****"))
            .field("enabled", &self.enabled)
            .field("public_host", &self.public_host)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_token() {
        let cfg = RelayServerConfig::new("relay.example.com", 7000).with_token("s3cret");
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("s3cret"));
        assert!(dbg.contains("****"));
    }

    #[test]
    fn public_host_falls_back_to_host() {
        let cfg = RelayServerConfig::new("relay.example.com", 7000);
        assert_eq!(cfg.public_host(), "relay.example.com");
        let cfg = cfg.with_public_host("cams.example.com");
        assert_eq!(cfg.public_host(), "cams.example.com");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: RelayServerConfig =
            serde_json::from_value(serde_json::json!({ "host": "r.example.net" })).unwrap();
        assert_eq!(cfg.port, DEFAULT_CONTROL_PORT);
        assert!(cfg.enabled);
        assert!(cfg.token.is_none());
    }
}
