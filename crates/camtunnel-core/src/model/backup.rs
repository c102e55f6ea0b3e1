// ── Backup snapshot ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AppSettings, CameraRecord, RelayServerConfig};

/// Everything needed to restore a setup on another device.
///
/// Each section is optional on import; a missing section leaves the
/// stored value untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    #[serde(default, rename = "frpsConfig")]
    pub relay_config: Option<RelayServerConfig>,
    #[serde(default)]
    pub cameras: Option<Vec<CameraRecord>>,
    #[serde(default)]
    pub settings: Option<AppSettings>,
    #[serde(default)]
    pub exported_at: Option<DateTime<Utc>>,
}

/// What an import actually applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub relay_config: bool,
    pub cameras: Option<usize>,
    pub settings: bool,
}
