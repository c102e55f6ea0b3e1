// ── Caller-facing facade ──
//
// One object wiring storage, registry, tunnel manager, resolver and probe
// together. Construct it once per process, call `init` on launch and
// `shutdown` on exit.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::broadcast::{BroadcastStream, SubscriberError, Subscription};
use crate::config::TunnelOptions;
use crate::error::{CoreError, ErrorKind};
use crate::model::{
    AppSettings, CameraId, CameraPatch, CameraRecord, ConfigSnapshot, ImportReport, NewCamera,
    RelayServerConfig, TunnelStatus,
};
use crate::probe::{ProbeReport, ReachabilityProbe};
use crate::registry::{CameraRegistry, RegistryChange, validate_host};
use crate::resolver::StreamResolver;
use crate::store::{KeyValueStore, Storage};
use crate::tunnel::{TunnelClient, TunnelManager};

/// Result of a composite operation, ready to show to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSummary {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Tunnel status after the operation.
    pub status: TunnelStatus,
}

impl OperationSummary {
    fn from_result(result: Result<TunnelStatus, CoreError>, ok: &str, current: TunnelStatus) -> Self {
        match result {
            Ok(status) => Self {
                success: true,
                message: ok.to_owned(),
                error_kind: None,
                status,
            },
            Err(e) => Self {
                success: false,
                message: e.to_string(),
                error_kind: Some(e.kind()),
                status: current,
            },
        }
    }
}

#[derive(Clone)]
pub struct CameraTunnelService {
    storage: Storage,
    registry: Arc<CameraRegistry>,
    manager: TunnelManager,
    resolver: StreamResolver,
    probe: ReachabilityProbe,
}

impl CameraTunnelService {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        client: Arc<dyn TunnelClient>,
        options: TunnelOptions,
    ) -> Result<Self, CoreError> {
        let storage = Storage::new(store);
        let registry = Arc::new(CameraRegistry::new(storage.clone()));
        let probe = ReachabilityProbe::new(options.probe_timeout)?;
        let manager = TunnelManager::new(storage.clone(), Arc::clone(&registry), client, options);
        let resolver = StreamResolver::new(manager.clone(), Arc::clone(&registry), storage.clone());
        Ok(Self {
            storage,
            registry,
            manager,
            resolver,
            probe,
        })
    }

    /// Reconcile persisted tunnel status, then honor `autoStart`.
    ///
    /// A failed auto-start is logged and reflected in the status; it does
    /// not fail `init`.
    pub async fn init(&self) -> Result<TunnelStatus, CoreError> {
        let status = self.manager.recover().await?;
        let settings = self.storage.load_settings().await?;
        if !settings.auto_start {
            return Ok(status);
        }
        info!("auto-start enabled; starting tunnel");
        match self.manager.start().await {
            Ok(status) => Ok(status),
            Err(e) => {
                warn!(error = %e, "auto-start failed");
                Ok(self.manager.status())
            }
        }
    }

    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }

    pub fn registry(&self) -> &Arc<CameraRegistry> {
        &self.registry
    }

    pub fn tunnel(&self) -> &TunnelManager {
        &self.manager
    }

    pub fn resolver(&self) -> &StreamResolver {
        &self.resolver
    }

    // ── Cameras ──────────────────────────────────────────────────────

    pub async fn get_cameras(&self) -> Result<Vec<CameraRecord>, CoreError> {
        self.registry.list().await
    }

    pub async fn get_camera(&self, id: &CameraId) -> Result<CameraRecord, CoreError> {
        self.registry.get(id).await
    }

    pub async fn add_camera(&self, camera: NewCamera) -> Result<CameraRecord, CoreError> {
        self.registry.add(camera).await
    }

    pub async fn update_camera(
        &self,
        id: &CameraId,
        patch: &CameraPatch,
    ) -> Result<CameraRecord, CoreError> {
        self.registry.update(id, patch).await
    }

    pub async fn remove_camera(&self, id: &CameraId) -> Result<bool, CoreError> {
        self.registry.remove(id).await
    }

    pub async fn probe_camera(&self, id: &CameraId) -> Result<ProbeReport, CoreError> {
        let camera = self.registry.get(id).await?;
        self.probe.probe(&camera).await
    }

    // ── Relay ────────────────────────────────────────────────────────

    pub async fn relay_config(&self) -> Result<Option<RelayServerConfig>, CoreError> {
        Ok(self.storage.load_relay_config().await?)
    }

    pub async fn save_relay_config(&self, relay: &RelayServerConfig) -> Result<(), CoreError> {
        validate_relay(relay)?;
        self.storage.save_relay_config(relay).await?;
        info!(host = %relay.host, port = relay.port, enabled = relay.enabled, "relay config saved");
        Ok(())
    }

    // ── Tunnel ───────────────────────────────────────────────────────

    pub fn get_tunnel_status(&self) -> TunnelStatus {
        self.manager.status()
    }

    /// Status as last persisted, possibly by another process that owns the
    /// tunnel client. Does not reconcile a stale record; see `init`.
    pub async fn recorded_status(&self) -> Result<TunnelStatus, CoreError> {
        Ok(self
            .storage
            .load_tunnel_status()
            .await?
            .unwrap_or_else(|| self.manager.status()))
    }

    /// Save `relay` if given, then start the tunnel. An invalid relay
    /// config fails before anything is launched.
    pub async fn setup_and_start(&self, relay: Option<RelayServerConfig>) -> OperationSummary {
        let result = async {
            if let Some(relay) = relay {
                self.save_relay_config(&relay).await?;
            }
            self.manager.start().await
        }
        .await;
        OperationSummary::from_result(result, "Tunnel started", self.manager.status())
    }

    pub async fn stop_tunnel(&self) -> OperationSummary {
        let result = self.manager.stop().await;
        OperationSummary::from_result(result, "Tunnel stopped", self.manager.status())
    }

    pub async fn restart_tunnel(&self) -> OperationSummary {
        let result = self.manager.restart().await;
        OperationSummary::from_result(result, "Tunnel restarted", self.manager.status())
    }

    pub async fn get_camera_stream_url(&self, camera: &CameraRecord) -> Result<Url, CoreError> {
        self.resolver.resolve(camera).await
    }

    #[must_use = "keep the Subscription to be able to unsubscribe"]
    pub fn on_status_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&TunnelStatus) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.manager.subscribe(handler)
    }

    pub fn status_stream(&self) -> BroadcastStream<TunnelStatus> {
        self.manager.subscribe_stream()
    }

    #[must_use = "keep the Subscription to be able to unsubscribe"]
    pub fn on_registry_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&RegistryChange) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.registry.subscribe(handler)
    }

    // ── Settings ─────────────────────────────────────────────────────

    pub async fn settings(&self) -> Result<AppSettings, CoreError> {
        Ok(self.storage.load_settings().await?)
    }

    pub async fn save_settings(&self, settings: &AppSettings) -> Result<(), CoreError> {
        Ok(self.storage.save_settings(settings).await?)
    }

    // ── Backup ───────────────────────────────────────────────────────

    pub async fn export_config(&self) -> Result<ConfigSnapshot, CoreError> {
        Ok(self.storage.export().await?)
    }

    /// Apply each section present in `snapshot`. Sections are validated
    /// up front, so an invalid snapshot changes nothing.
    pub async fn import_config(&self, snapshot: ConfigSnapshot) -> Result<ImportReport, CoreError> {
        if let Some(ref relay) = snapshot.relay_config {
            validate_relay(relay)?;
        }

        let mut report = ImportReport::default();
        if let Some(cameras) = snapshot.cameras {
            report.cameras = Some(self.registry.replace_all(cameras).await?);
        }
        if let Some(relay) = snapshot.relay_config {
            self.storage.save_relay_config(&relay).await?;
            report.relay_config = true;
        }
        if let Some(settings) = snapshot.settings {
            self.storage.save_settings(&settings).await?;
            report.settings = true;
        }
        info!(?report, "configuration imported");
        Ok(report)
    }

    /// Forget everything. Refused while a tunnel is starting or running.
    pub async fn clear_all_data(&self) -> Result<(), CoreError> {
        let state = self.manager.status().state;
        if state.is_running() {
            return Err(CoreError::precondition(format!(
                "stop the tunnel before clearing data (current state: {state})"
            )));
        }
        self.storage.clear_all().await?;
        info!("all stored data cleared");
        Ok(())
    }
}

fn validate_relay(relay: &RelayServerConfig) -> Result<(), CoreError> {
    validate_host("relay host", relay.host.trim())?;
    if relay.port == 0 {
        return Err(CoreError::validation("relay port must be between 1 and 65535"));
    }
    if let Some(public) = relay
        .public_host
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty())
    {
        validate_host("public host", public)?;
    }
    Ok(())
}
