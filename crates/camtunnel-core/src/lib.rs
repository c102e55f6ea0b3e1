//! Tunnel lifecycle and camera registry for exposing LAN RTSP cameras
//! through an frp relay.
//!
//! - **[`CameraTunnelService`]**: caller-facing facade. Wires everything
//!   below together; construct once per process, [`init`](CameraTunnelService::init)
//!   on launch, [`shutdown`](CameraTunnelService::shutdown) on exit.
//!
//! - **[`TunnelManager`]**: the Stopped / Starting / Active / Stopping /
//!   Error state machine. Launches the tunnel client through the
//!   [`TunnelClient`] capability ([`FrpcClient`] in production), persists
//!   every transition and publishes it to subscribers.
//!
//! - **[`CameraRegistry`]**: validated CRUD over camera records, with
//!   remote-port uniqueness among enabled cameras.
//!
//! - **[`ClientConfig`]**: deterministic frpc configuration built from the
//!   relay settings and the enabled cameras.
//!
//! - **[`StreamResolver`]**: public `rtsp://` URL for a camera, only while
//!   the tunnel is Active.
//!
//! - **[`Broadcaster`]**: explicit observer registry with removal handles.
//!
//! - **Persistence** ([`store`]): a [`KeyValueStore`] capability
//!   ([`MemoryStore`], [`FileStore`]) and the typed [`Storage`] adapter.

pub mod broadcast;
pub mod config;
pub mod error;
pub mod model;
pub mod probe;
pub mod registry;
pub mod relay_config;
pub mod resolver;
pub mod service;
pub mod store;
pub mod tunnel;

// ── Primary re-exports ──────────────────────────────────────────────
pub use broadcast::{BroadcastStream, Broadcaster, SubscriberError, Subscription};
pub use config::TunnelOptions;
pub use error::{CoreError, ErrorKind};
pub use probe::{ProbeReport, ReachabilityProbe};
pub use registry::{CameraRegistry, RegistryChange};
pub use relay_config::{ClientAuth, ClientConfig, ProxyConfig};
pub use resolver::{StreamResolver, stream_url};
pub use service::{CameraTunnelService, OperationSummary};
pub use store::{FileStore, KeyValueStore, MemoryStore, Storage, StoreError};
pub use tunnel::{FrpcClient, TunnelClient, TunnelControl, TunnelEvent, TunnelManager, TunnelSession};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    AppSettings, CameraId, CameraPatch, CameraRecord, ConfigSnapshot, DEFAULT_CONTROL_PORT,
    DEFAULT_RTSP_PORT, ImportReport, NewCamera, RelayServerConfig, TunnelState, TunnelStatus,
};
