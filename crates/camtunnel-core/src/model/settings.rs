// ── App settings ──

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_notifications() -> bool {
    true
}

fn default_log_level() -> String {
    "info".into()
}

/// Free-form user preferences. The core only reads `auto_start`; unknown
/// keys are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default = "default_notifications")]
    pub notifications: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            auto_start: false,
            notifications: default_notifications(),
            log_level: default_log_level(),
            extra: Map::new(),
        }
    }
}

impl AppSettings {
    /// Set a key by its stored (camelCase) name. Known keys are type-checked.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), String> {
        match key {
            "autoStart" => {
                self.auto_start = value
                    .as_bool()
                    .ok_or_else(|| format!("{key} must be a boolean"))?;
            }
            "notifications" => {
                self.notifications = value
                    .as_bool()
                    .ok_or_else(|| format!("{key} must be a boolean"))?;
            }
            "logLevel" => {
                value
                    .as_str()
                    .ok_or_else(|| format!("{key} must be a string"))?
                    .clone_into(&mut self.log_level);
            }
            _ => {
                self.extra.insert(key.to_owned(), value);
            }
        }
        Ok(())
    }
}
