// ── Typed persistence adapter ──
//
// Maps the four logical records onto their store keys. Decoding is
// strict: malformed data surfaces as a `StoreError` instead of silently
// falling back to defaults.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{KeyValueStore, MemoryStore, StoreError};
use crate::model::{AppSettings, CameraRecord, ConfigSnapshot, RelayServerConfig, TunnelStatus};

pub const RELAY_CONFIG_KEY: &str = "frps_server_config";
pub const CAMERAS_KEY: &str = "camera_list";
pub const TUNNEL_STATUS_KEY: &str = "tunnel_status";
pub const APP_SETTINGS_KEY: &str = "app_settings";

/// Every key this crate owns.
pub const ALL_KEYS: [&str; 4] = [
    RELAY_CONFIG_KEY,
    CAMERAS_KEY,
    TUNNEL_STATUS_KEY,
    APP_SETTINGS_KEY,
];

/// Typed view over a [`KeyValueStore`]. Cheap to clone.
#[derive(Clone)]
pub struct Storage {
    kv: Arc<dyn KeyValueStore>,
}

impl Storage {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(value) = self.kv.get(key).await? else {
            return Ok(None);
        };
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                key: key.to_owned(),
                source,
            })
    }

    async fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value).map_err(|source| StoreError::Encode {
            key: key.to_owned(),
            source,
        })?;
        self.kv.set(key, value).await
    }

    // ── Relay config ─────────────────────────────────────────────────

    pub async fn load_relay_config(&self) -> Result<Option<RelayServerConfig>, StoreError> {
        self.load(RELAY_CONFIG_KEY).await
    }

    pub async fn save_relay_config(&self, config: &RelayServerConfig) -> Result<(), StoreError> {
        self.save(RELAY_CONFIG_KEY, config).await
    }

    // ── Cameras ──────────────────────────────────────────────────────

    pub async fn load_cameras(&self) -> Result<Vec<CameraRecord>, StoreError> {
        Ok(self.load(CAMERAS_KEY).await?.unwrap_or_default())
    }

    pub async fn save_cameras(&self, cameras: &[CameraRecord]) -> Result<(), StoreError> {
        self.save(CAMERAS_KEY, cameras).await
    }

    // ── Tunnel status ────────────────────────────────────────────────

    pub async fn load_tunnel_status(&self) -> Result<Option<TunnelStatus>, StoreError> {
        self.load(TUNNEL_STATUS_KEY).await
    }

    pub async fn save_tunnel_status(&self, status: &TunnelStatus) -> Result<(), StoreError> {
        self.save(TUNNEL_STATUS_KEY, status).await
    }

    // ── Settings ─────────────────────────────────────────────────────

    pub async fn load_settings(&self) -> Result<AppSettings, StoreError> {
        Ok(self.load(APP_SETTINGS_KEY).await?.unwrap_or_default())
    }

    pub async fn save_settings(&self, settings: &AppSettings) -> Result<(), StoreError> {
        self.save(APP_SETTINGS_KEY, settings).await
    }

    // ── Whole-store operations ───────────────────────────────────────

    pub async fn clear_all(&self) -> Result<(), StoreError> {
        self.kv.remove(&ALL_KEYS).await
    }

    /// Snapshot relay config, cameras and settings for backup.
    pub async fn export(&self) -> Result<ConfigSnapshot, StoreError> {
        Ok(ConfigSnapshot {
            relay_config: self.load_relay_config().await?,
            cameras: Some(self.load_cameras().await?),
            settings: Some(self.load_settings().await?),
            exported_at: Some(Utc::now()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::NewCamera;
    use serde_json::json;

    #[tokio::test]
    async fn empty_store_yields_defaults() {
        let storage = Storage::in_memory();
        assert!(storage.load_relay_config().await.unwrap().is_none());
        assert!(storage.load_cameras().await.unwrap().is_empty());
        assert!(storage.load_tunnel_status().await.unwrap().is_none());
        assert_eq!(storage.load_settings().await.unwrap(), AppSettings::default());
    }

    #[tokio::test]
    async fn malformed_camera_list_is_an_error() {
        let storage = Storage::in_memory();
        storage
            .backend()
            .set(CAMERAS_KEY, json!({ "not": "a list" }))
            .await
            .unwrap();
        let err = storage.load_cameras().await.unwrap_err();
        assert!(matches!(err, StoreError::Decode { ref key, .. } if key == CAMERAS_KEY));
    }

    #[tokio::test]
    async fn clear_all_removes_every_key() {
        let storage = Storage::in_memory();
        storage
            .save_relay_config(&RelayServerConfig::new("relay.example.com", 7000))
            .await
            .unwrap();
        storage
            .save_tunnel_status(&TunnelStatus::stopped(Utc::now()))
            .await
            .unwrap();
        storage.clear_all().await.unwrap();
        assert!(storage.backend().keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn export_collects_sections() {
        let storage = Storage::in_memory();
        let cam = NewCamera::new("Porch", "192.168.1.30", 6005).into_record(Utc::now());
        storage.save_cameras(&[cam.clone()]).await.unwrap();

        let snap = storage.export().await.unwrap();
        assert!(snap.relay_config.is_none());
        assert_eq!(snap.cameras, Some(vec![cam]));
        assert!(snap.exported_at.is_some());
    }
}
