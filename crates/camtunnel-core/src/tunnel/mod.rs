// ── Tunnel client capability ──
//
// The manager never talks to a process directly. A `TunnelClient` launches
// one client run for a given configuration and hands back a session: an
// event channel plus a control handle for terminating it.

mod frpc;
mod manager;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::CoreError;
use crate::relay_config::ClientConfig;

pub use frpc::FrpcClient;
pub use manager::TunnelManager;

/// Something the running client reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelEvent {
    /// Login to the relay succeeded; proxies are being served.
    Connected,
    /// The relay connection dropped while the client keeps running and
    /// retrying on its own.
    Disconnected { reason: String },
    /// The client is gone. Always the last event of a session.
    Exited { reason: String },
}

/// One launched client run.
pub struct TunnelSession {
    pub events: mpsc::Receiver<TunnelEvent>,
    pub control: Box<dyn TunnelControl>,
}

/// Launches tunnel-client runs.
#[async_trait]
pub trait TunnelClient: Send + Sync {
    async fn launch(&self, config: &ClientConfig) -> Result<TunnelSession, CoreError>;
}

/// Control handle for one run.
#[async_trait]
pub trait TunnelControl: Send + Sync {
    /// Ask the client to exit. Calling it again after the first request is
    /// a no-op. Exit is confirmed by a `TunnelEvent::Exited` on the session.
    async fn terminate(&self) -> Result<(), CoreError>;
}
