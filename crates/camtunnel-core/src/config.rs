// ── Runtime tuning ──
//
// How long the manager waits on the tunnel client and the reachability
// probe. Core never reads config files; the CLI builds a `TunnelOptions`
// from its own configuration and hands it in.

use std::time::Duration;

/// Timeouts applied by the tunnel manager and the reachability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelOptions {
    /// How long `start` waits for the client to report a successful login.
    pub start_timeout: Duration,
    /// How long `stop` waits for the client process to exit.
    pub stop_timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for TunnelOptions {
    fn default() -> Self {
        Self {
            start_timeout: Duration::from_secs(30),
            stop_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(30),
        }
    }
}
