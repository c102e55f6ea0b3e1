//! On-disk configuration for camtunnel.
//!
//! TOML file at the platform config dir, layered with `CAMTUNNEL_*`
//! environment variables, relay-token resolution (env + keyring +
//! plaintext), and translation to `camtunnel_core::TunnelOptions`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use camtunnel_core::TunnelOptions;

const KEYRING_SERVICE: &str = "camtunnel";
const KEYRING_TOKEN_USER: &str = "relay-token";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Where the camera list, relay config and tunnel status are stored.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub frpc: FrpcSettings,

    #[serde(default)]
    pub relay: RelaySettings,

    #[serde(default)]
    pub defaults: Defaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            frpc: FrpcSettings::default(),
            relay: RelaySettings::default(),
            defaults: Defaults::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FrpcSettings {
    /// frpc executable; a bare name is looked up on `PATH`.
    #[serde(default = "default_frpc_binary")]
    pub binary: PathBuf,

    /// Where the generated frpc.toml is written. Defaults to `<data_dir>/run`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,

    /// Seconds to wait for the relay login.
    #[serde(default = "default_start_timeout")]
    pub start_timeout: u64,

    /// Seconds to wait for frpc to exit after being told to.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout: u64,
}

impl Default for FrpcSettings {
    fn default() -> Self {
        Self {
            binary: default_frpc_binary(),
            work_dir: None,
            start_timeout: default_start_timeout(),
            stop_timeout: default_stop_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RelaySettings {
    /// Environment variable holding the relay auth token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Plaintext token (prefer the keyring or the env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Reachability probe timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_frpc_binary() -> PathBuf {
    PathBuf::from("frpc")
}
fn default_start_timeout() -> u64 {
    30
}
fn default_stop_timeout() -> u64 {
    10
}
fn default_token_env() -> String {
    "CAMTUNNEL_RELAY_TOKEN".into()
}
fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Directory for generated frpc configuration.
    pub fn work_dir(&self) -> PathBuf {
        self.frpc
            .work_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("run"))
    }

    /// Directory the file-backed store lives in.
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frpc.start_timeout == 0 {
            return Err(ConfigError::Validation {
                field: "frpc.start_timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        if self.frpc.stop_timeout == 0 {
            return Err(ConfigError::Validation {
                field: "frpc.stop_timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        if self.frpc.binary.as_os_str().is_empty() {
            return Err(ConfigError::Validation {
                field: "frpc.binary".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Runtime timeouts for the core.
    pub fn to_tunnel_options(&self) -> TunnelOptions {
        TunnelOptions {
            start_timeout: Duration::from_secs(self.frpc.start_timeout),
            stop_timeout: Duration::from_secs(self.frpc.stop_timeout),
            probe_timeout: Duration::from_secs(self.defaults.timeout),
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "camtunnel", "camtunnel")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn default_data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".local/share"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn home_fallback(sub: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(sub);
    p.push("camtunnel");
    p
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Layering: built-in defaults, then the TOML file (if present), then
/// `CAMTUNNEL_*` variables. Nested keys use a double underscore, e.g.
/// `CAMTUNNEL_FRPC__BINARY`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CAMTUNNEL_").split("__"))
        .extract()?;
    config.validate()?;
    Ok(config)
}

/// Load config, returning the defaults if it can't be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Saving ──────────────────────────────────────────────────────────

pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Relay token ─────────────────────────────────────────────────────

/// Resolve the relay auth token: `relay.token_env` variable, then the
/// system keyring, then the plaintext `relay.token`. `None` when the relay
/// runs without auth.
pub fn resolve_relay_token(cfg: &Config) -> Option<SecretString> {
    // 1. Env var
    if let Some(val) = std::env::var(&cfg.relay.token_env)
        .ok()
        .filter(|v| !v.is_empty())
    {
        return Some(SecretString::from(val));
    }

    // 2. System keyring
    if let Some(secret) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_TOKEN_USER)
        .ok()
        .and_then(|entry| entry.get_password().ok())
    {
        return Some(SecretString::from(secret));
    }

    // 3. Plaintext in config
    cfg.relay
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(|t| SecretString::from(t.to_owned()))
}

/// Store the relay token in the system keyring.
pub fn store_relay_token(token: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, KEYRING_TOKEN_USER)
        .and_then(|entry| entry.set_password(token))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.frpc.binary, PathBuf::from("frpc"));
        assert_eq!(cfg.frpc.start_timeout, 30);
        assert_eq!(cfg.frpc.stop_timeout, 10);
        assert_eq!(cfg.relay.token_env, "CAMTUNNEL_RELAY_TOKEN");
        assert_eq!(cfg.defaults.output, "table");
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
data_dir = "/var/lib/camtunnel"

[frpc]
binary = "/usr/local/bin/frpc"
start_timeout = 45
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/camtunnel"));
        assert_eq!(cfg.frpc.binary, PathBuf::from("/usr/local/bin/frpc"));
        assert_eq!(cfg.frpc.start_timeout, 45);
        assert_eq!(cfg.frpc.stop_timeout, 10);
        assert_eq!(cfg.work_dir(), PathBuf::from("/var/lib/camtunnel/run"));
        assert_eq!(cfg.store_dir(), PathBuf::from("/var/lib/camtunnel/store"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[frpc]\nstop_timeout = 0\n").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "frpc.stop_timeout"));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.frpc.work_dir = Some(dir.path().join("work"));
        cfg.defaults.output = "json".into();
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn tunnel_options_follow_config() {
        let mut cfg = Config::default();
        cfg.frpc.start_timeout = 5;
        cfg.defaults.timeout = 3;
        let opts = cfg.to_tunnel_options();
        assert_eq!(opts.start_timeout, Duration::from_secs(5));
        assert_eq!(opts.stop_timeout, Duration::from_secs(10));
        assert_eq!(opts.probe_timeout, Duration::from_secs(3));
    }
}
