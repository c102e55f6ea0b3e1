// ── Domain model ──
//
// Canonical types shared by the registry, the tunnel manager and callers.
// Everything here is plain data with serde derives; behavior lives in the
// components that own each type.

mod backup;
mod camera;
mod camera_id;
mod relay;
mod settings;
mod status;

pub use backup::{ConfigSnapshot, ImportReport};
pub use camera::{CameraPatch, CameraRecord, DEFAULT_RTSP_PORT, NewCamera};
pub use camera_id::CameraId;
pub use relay::{DEFAULT_CONTROL_PORT, RelayServerConfig};
pub use settings::AppSettings;
pub use status::{TunnelState, TunnelStatus};
