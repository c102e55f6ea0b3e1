//! CLI configuration: thin wrapper around `camtunnel_config`.
//!
//! Adds resolution that respects `GlobalOpts` overrides (--config,
//! --data-dir) and builds the service the command handlers talk to.

use std::path::PathBuf;
use std::sync::Arc;

use camtunnel_core::{CameraTunnelService, FileStore, FrpcClient};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use camtunnel_config::{
    Config, config_path, load_config_from, resolve_relay_token, save_config_to,
    store_relay_token,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Config file in effect: `--config` / `CAMTUNNEL_CONFIG`, else the
/// platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// Load the layered config and apply flag overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = load_config_from(&config_file(global))?;
    if let Some(ref dir) = global.data_dir {
        cfg.data_dir.clone_from(dir);
    }
    tracing::debug!(
        data_dir = %cfg.data_dir.display(),
        frpc = %cfg.frpc.binary.display(),
        "configuration loaded"
    );
    Ok(cfg)
}

/// File-backed service with the real frpc launcher.
pub fn build_service(cfg: &Config) -> Result<CameraTunnelService, CliError> {
    let store = Arc::new(FileStore::new(cfg.store_dir()));
    let client = Arc::new(FrpcClient::new(cfg.frpc.binary.clone(), cfg.work_dir()));
    Ok(CameraTunnelService::new(
        store,
        client,
        cfg.to_tunnel_options(),
    )?)
}
