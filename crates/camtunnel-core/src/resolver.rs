// ── Stream resolver ──
//
// Turns a camera into the RTSP URL a remote viewer pulls through the
// relay. Read-only: it consults the tunnel status, the registry and the
// relay config, and never mutates any of them.

use std::sync::Arc;

use url::Url;

use crate::error::CoreError;
use crate::model::{CameraId, CameraRecord, RelayServerConfig, TunnelState};
use crate::registry::CameraRegistry;
use crate::store::Storage;
use crate::tunnel::TunnelManager;

/// Scheme understood by the external player.
pub const STREAM_SCHEME: &str = "rtsp";

#[derive(Clone)]
pub struct StreamResolver {
    manager: TunnelManager,
    registry: Arc<CameraRegistry>,
    storage: Storage,
}

impl StreamResolver {
    pub fn new(manager: TunnelManager, registry: Arc<CameraRegistry>, storage: Storage) -> Self {
        Self {
            manager,
            registry,
            storage,
        }
    }

    /// Public stream URL for `camera`.
    ///
    /// The registry's copy of the camera is authoritative; the argument
    /// only identifies it. Fails with `TunnelNotActive` unless the tunnel
    /// is Active, and `NotFound` for unknown or disabled cameras. A camera
    /// enabled after the tunnel started is not carried by the running
    /// client, so it fails with `Precondition` until a restart.
    pub async fn resolve(&self, camera: &CameraRecord) -> Result<Url, CoreError> {
        self.resolve_id(&camera.id).await
    }

    pub async fn resolve_id(&self, id: &CameraId) -> Result<Url, CoreError> {
        let status = self.manager.status();
        if status.state != TunnelState::Active {
            return Err(CoreError::TunnelNotActive {
                state: status.state,
            });
        }

        let camera = self.registry.get(id).await?;
        if !camera.enabled {
            return Err(CoreError::camera_not_found(format!("{id} (disabled)")));
        }
        if !status.mapped_ports.is_empty() && !status.mapped_ports.contains(&camera.remote_port) {
            return Err(CoreError::precondition(format!(
                "camera '{}' (remotePort {}) is not part of the running tunnel configuration; restart the tunnel",
                camera.name, camera.remote_port
            )));
        }

        let relay = self
            .storage
            .load_relay_config()
            .await?
            .ok_or_else(|| CoreError::precondition("no relay server is configured"))?;
        stream_url(&relay, &camera)
    }

    /// URLs for every enabled camera, in registry order. Stops at the
    /// first failure.
    pub async fn resolve_all(&self) -> Result<Vec<(CameraRecord, Url)>, CoreError> {
        let mut out = Vec::new();
        for camera in self.registry.enabled().await? {
            let url = self.resolve_id(&camera.id).await?;
            out.push((camera, url));
        }
        Ok(out)
    }
}

/// `rtsp://<public host>:<remote port>/<stream path>`.
pub fn stream_url(relay: &RelayServerConfig, camera: &CameraRecord) -> Result<Url, CoreError> {
    let host = relay.public_host().trim();
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_owned()
    };
    let path = camera.stream_path.as_deref().unwrap_or_default();
    let raw = format!("{STREAM_SCHEME}://{host}:{}/{path}", camera.remote_port);
    Url::parse(&raw).map_err(|e| CoreError::validation(format!("invalid stream URL '{raw}': {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::NewCamera;
    use chrono::Utc;

    #[test]
    fn url_uses_public_host_and_remote_port() {
        let relay = RelayServerConfig::new("relay.example.com", 7000);
        let cam = NewCamera::new("Front Door", "192.168.1.10", 6001).into_record(Utc::now());
        assert_eq!(
            stream_url(&relay, &cam).unwrap().as_str(),
            "rtsp://relay.example.com:6001/"
        );

        let relay = relay.with_public_host("cams.example.net");
        let cam = NewCamera::new("Yard", "192.168.1.11", 6002)
            .with_stream_path("live/main")
            .into_record(Utc::now());
        assert_eq!(
            stream_url(&relay, &cam).unwrap().as_str(),
            "rtsp://cams.example.net:6002/live/main"
        );
    }

    #[test]
    fn ipv6_relay_host_is_bracketed() {
        let relay = RelayServerConfig::new("2001:db8::7", 7000);
        let cam = NewCamera::new("v6", "192.168.1.12", 6003).into_record(Utc::now());
        assert_eq!(
            stream_url(&relay, &cam).unwrap().as_str(),
            "rtsp://[2001:db8::7]:6003/"
        );
    }
}
