// ── Camera records ──
//
// `CameraRecord` is the stored shape (camelCase JSON, compatible with
// existing backups). `NewCamera` and `CameraPatch` are the inputs to the
// registry's add and update operations; defaults are applied when a
// `NewCamera` is turned into a record, never at call sites.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CameraId;

/// Standard RTSP port, used when no local port is given.
pub const DEFAULT_RTSP_PORT: u16 = 554;

fn default_local_port() -> u16 {
    DEFAULT_RTSP_PORT
}

fn default_enabled() -> bool {
    true
}

/// One local RTSP source and its public port mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraRecord {
    pub id: CameraId,
    pub name: String,
    /// Host or IP of the camera on the local network.
    #[serde(rename = "localIP")]
    pub local_ip: String,
    #[serde(default = "default_local_port")]
    pub local_port: u16,
    /// Port the relay exposes this camera on.
    pub remote_port: u16,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Path appended to the stream URL, e.g. `stream1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_path: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl CameraRecord {
    /// `host:port` of the camera on the local network.
    pub fn local_address(&self) -> String {
        if self.local_ip.contains(':') {
            format!("[{}]:{}", self.local_ip, self.local_port)
        } else {
            format!("{}:{}", self.local_ip, self.local_port)
        }
    }
}

/// Input for [`CameraRegistry::add`](crate::registry::CameraRegistry::add).
///
/// `name`, `local_ip` and `remote_port` are required; everything else
/// falls back to a default when the record is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCamera {
    #[serde(default)]
    pub id: Option<CameraId>,
    pub name: String,
    #[serde(rename = "localIP")]
    pub local_ip: String,
    #[serde(default)]
    pub local_port: Option<u16>,
    pub remote_port: u16,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub stream_path: Option<String>,
}

impl NewCamera {
    pub fn new(name: impl Into<String>, local_ip: impl Into<String>, remote_port: u16) -> Self {
        Self {
            id: None,
            name: name.into(),
            local_ip: local_ip.into(),
            local_port: None,
            remote_port,
            enabled: None,
            stream_path: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<CameraId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_local_port(mut self, port: u16) -> Self {
        self.local_port = Some(port);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn with_stream_path(mut self, path: impl Into<String>) -> Self {
        self.stream_path = Some(path.into());
        self
    }

    pub(crate) fn into_record(self, created_at: DateTime<Utc>) -> CameraRecord {
        CameraRecord {
            id: self.id.unwrap_or_else(CameraId::generate),
            name: self.name.trim().to_owned(),
            local_ip: self.local_ip.trim().to_owned(),
            local_port: self.local_port.unwrap_or(DEFAULT_RTSP_PORT),
            remote_port: self.remote_port,
            enabled: self.enabled.unwrap_or(true),
            stream_path: normalize_stream_path(self.stream_path),
            created_at,
        }
    }
}

/// Partial update for an existing camera. `None` leaves a field untouched;
/// an empty `stream_path` clears it. Identity and creation time are not
/// patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "localIP")]
    pub local_ip: Option<String>,
    #[serde(default)]
    pub local_port: Option<u16>,
    #[serde(default)]
    pub remote_port: Option<u16>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub stream_path: Option<String>,
}

impl CameraPatch {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge onto a copy of `record`.
    pub(crate) fn apply_to(&self, record: &CameraRecord) -> CameraRecord {
        let mut merged = record.clone();
        if let Some(ref name) = self.name {
            merged.name = name.trim().to_owned();
        }
        if let Some(ref ip) = self.local_ip {
            merged.local_ip = ip.trim().to_owned();
        }
        if let Some(port) = self.local_port {
            merged.local_port = port;
        }
        if let Some(port) = self.remote_port {
            merged.remote_port = port;
        }
        if let Some(enabled) = self.enabled {
            merged.enabled = enabled;
        }
        if self.stream_path.is_some() {
            merged.stream_path = normalize_stream_path(self.stream_path.clone());
        }
        merged
    }
}

fn normalize_stream_path(path: Option<String>) -> Option<String> {
    path.map(|p| p.trim().trim_start_matches('/').to_owned())
        .filter(|p| !p.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_camera_applies_defaults() {
        let now = Utc::now();
        let rec = NewCamera::new(" Front Door ", "192.168.1.10", 6001).into_record(now);
        assert_eq!(rec.name, "Front Door");
        assert_eq!(rec.local_port, DEFAULT_RTSP_PORT);
        assert!(rec.enabled);
        assert!(rec.id.is_generated());
        assert_eq!(rec.created_at, now);
        assert_eq!(rec.stream_path, None);
    }

    #[test]
    fn patch_merges_only_present_fields() {
        let rec = NewCamera::new("Yard", "10.0.0.5", 6002)
            .with_stream_path("/stream1")
            .into_record(Utc::now());
        assert_eq!(rec.stream_path.as_deref(), Some("stream1"));

        let patch = CameraPatch {
            remote_port: Some(6010),
            stream_path: Some(String::new()),
            ..CameraPatch::default()
        };
        let merged = patch.apply_to(&rec);
        assert_eq!(merged.remote_port, 6010);
        assert_eq!(merged.name, "Yard");
        assert_eq!(merged.stream_path, None);
        assert_eq!(merged.id, rec.id);
    }

    #[test]
    fn record_json_uses_stored_field_names() {
        let json = serde_json::json!({
            "id": "cam_1700000000000",
            "name": "Garage",
            "localIP": "192.168.1.20",
            "remotePort": 6003,
            "createdAt": "2024-01-01T00:00:00Z"
        });
        let rec: CameraRecord = serde_json::from_value(json).unwrap();
        assert_eq!(rec.local_port, 554);
        assert!(rec.enabled);

        let back = serde_json::to_value(&rec).unwrap();
        assert_eq!(back["localIP"], "192.168.1.20");
        assert_eq!(back["remotePort"], 6003);
    }

    #[test]
    fn local_address_brackets_ipv6() {
        let rec = NewCamera::new("v6", "fe80::1", 6004).into_record(Utc::now());
        assert_eq!(rec.local_address(), "[fe80::1]:554");
    }
}
