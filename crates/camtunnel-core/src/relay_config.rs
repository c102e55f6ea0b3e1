// ── Tunnel-client configuration ──
//
// Builds the frpc client configuration from the relay settings and the
// enabled cameras. The same inputs always produce byte-identical output:
// proxies are ordered by remote port, then id.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::error::CoreError;
use crate::model::{CameraRecord, RelayServerConfig};
use crate::registry::validate_host;

/// Top-level frpc client document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub server_addr: String,
    pub server_port: u16,
    /// Exit instead of retrying forever when the first login fails.
    pub login_fail_exit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<ClientAuth>,
    pub proxies: Vec<ProxyConfig>,
}

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ClientAuth {
    pub method: String,
    pub token: String,
}

impl fmt::Debug for ClientAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientAuth")
            .field("method", &self.method)
            .field("token", &"****")
            .finish()
    }
}

/// One TCP port mapping: relay `remote_port` → camera `local_ip:local_port`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub proxy_type: String,
    #[serde(rename = "localIP")]
    pub local_ip: String,
    pub local_port: u16,
    pub remote_port: u16,
}

impl ClientConfig {
    /// Build the client configuration for `relay` carrying every enabled
    /// camera in `cameras`.
    pub fn build(relay: &RelayServerConfig, cameras: &[CameraRecord]) -> Result<Self, CoreError> {
        if !relay.enabled {
            return Err(CoreError::validation("relay server is disabled"));
        }
        validate_host("relay host", relay.host.trim())?;
        if relay.port == 0 {
            return Err(CoreError::validation("relay port must be between 1 and 65535"));
        }

        let mut enabled: Vec<&CameraRecord> = cameras.iter().filter(|c| c.enabled).collect();
        if enabled.is_empty() {
            return Err(CoreError::validation("no enabled cameras to expose"));
        }
        enabled.sort_by(|a, b| {
            a.remote_port
                .cmp(&b.remote_port)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut ports = HashSet::new();
        let mut proxies = Vec::with_capacity(enabled.len());
        for camera in enabled {
            if camera.remote_port == relay.port {
                return Err(CoreError::validation(format!(
                    "camera '{}' uses remotePort {}, which is the relay control port",
                    camera.name, camera.remote_port
                )));
            }
            if !ports.insert(camera.remote_port) {
                return Err(CoreError::validation(format!(
                    "remotePort {} is mapped by more than one enabled camera",
                    camera.remote_port
                )));
            }
            proxies.push(ProxyConfig {
                name: camera.id.to_string(),
                proxy_type: "tcp".into(),
                local_ip: camera.local_ip.clone(),
                local_port: camera.local_port,
                remote_port: camera.remote_port,
            });
        }

        let auth = relay
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|token| ClientAuth {
                method: "token".into(),
                token: token.to_owned(),
            });

        Ok(Self {
            server_addr: relay.host.trim().to_owned(),
            server_port: relay.port,
            login_fail_exit: true,
            auth,
            proxies,
        })
    }

    /// Render as frpc TOML.
    pub fn render(&self) -> Result<String, CoreError> {
        toml::to_string(self).map_err(|e| CoreError::Internal(format!("render client config: {e}")))
    }

    /// Stable identifier of the rendered configuration (64-bit FNV-1a, hex).
    pub fn fingerprint(&self) -> Result<String, CoreError> {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0100_0000_01b3;

        let rendered = self.render()?;
        let hash = rendered
            .bytes()
            .fold(OFFSET, |h, b| (h ^ u64::from(b)).wrapping_mul(PRIME));
        Ok(format!("{hash:016x}"))
    }

    /// Remote ports carried by this configuration, ascending.
    pub fn mapped_ports(&self) -> Vec<u16> {
        self.proxies.iter().map(|p| p.remote_port).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::NewCamera;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn camera(id: &str, port: u16) -> CameraRecord {
        NewCamera::new(format!("Camera {id}"), "192.168.1.10", port)
            .with_id(id)
            .into_record(Utc::now())
    }

    fn relay() -> RelayServerConfig {
        RelayServerConfig::new("relay.example.com", 7000).with_token("secret")
    }

    #[test]
    fn proxies_are_sorted_and_disabled_cameras_skipped() {
        let mut off = camera("cam_off", 6000);
        off.enabled = false;
        let cameras = vec![camera("cam_b", 6002), off, camera("cam_a", 6001)];

        let cfg = ClientConfig::build(&relay(), &cameras).unwrap();
        let names: Vec<&str> = cfg.proxies.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["cam_a", "cam_b"]);
        assert_eq!(cfg.mapped_ports(), vec![6001, 6002]);
    }

    #[test]
    fn render_is_deterministic() {
        let forward = vec![camera("cam_a", 6001), camera("cam_b", 6002)];
        let reverse = vec![camera("cam_b", 6002), camera("cam_a", 6001)];
        let a = ClientConfig::build(&relay(), &forward).unwrap();
        let b = ClientConfig::build(&relay(), &reverse).unwrap();
        assert_eq!(a.render().unwrap(), b.render().unwrap());
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_eq!(a.fingerprint().unwrap().len(), 16);
    }

    #[test]
    fn render_contains_frpc_keys() {
        let cfg = ClientConfig::build(&relay(), &[camera("cam_a", 6001)]).unwrap();
        let text = cfg.render().unwrap();
        assert!(text.contains("serverAddr = \"relay.example.com\""));
        assert!(text.contains("serverPort = 7000"));
        assert!(text.contains("loginFailExit = true"));
        assert!(text.contains("[auth]"));
        assert!(text.contains("[[proxies]]"));
        assert!(text.contains("type = \"tcp\""));
        assert!(text.contains("localIP = \"192.168.1.10\""));
        assert!(text.contains("localPort = 554"));
        assert!(text.contains("remotePort = 6001"));
    }

    #[test]
    fn blank_token_means_no_auth() {
        let relay = RelayServerConfig::new("relay.example.com", 7000).with_token("  ");
        let cfg = ClientConfig::build(&relay, &[camera("cam_a", 6001)]).unwrap();
        assert!(cfg.auth.is_none());
        assert!(!cfg.render().unwrap().contains("[auth]"));
    }

    #[test]
    fn rejects_unusable_inputs() {
        let cams = [camera("cam_a", 6001)];

        let mut disabled = relay();
        disabled.enabled = false;
        let err = ClientConfig::build(&disabled, &cams).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = ClientConfig::build(&RelayServerConfig::new("", 7000), &cams).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = ClientConfig::build(&relay(), &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = ClientConfig::build(&relay(), &[camera("cam_a", 7000)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let dup = [camera("cam_a", 6001), camera("cam_b", 6001)];
        let err = ClientConfig::build(&relay(), &dup).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn debug_hides_token() {
        let cfg = ClientConfig::build(&relay(), &[camera("cam_a", 6001)]).unwrap();
        assert!(!format!("{cfg:?}").contains("secret"));
    }
}
