// ── Tunnel status ──
//
// The single, process-wide answer to "is the tunnel usable right now".
// Only the tunnel manager constructs new values; the constructors below
// keep `started_at` and `last_error` consistent with the state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle state of the tunnel client.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TunnelState {
    #[default]
    Stopped,
    Starting,
    Active,
    Stopping,
    Error,
}

impl TunnelState {
    /// A tunnel-client process is (or should be) running.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Starting | Self::Active)
    }

    /// Nothing left to stop.
    pub fn is_at_rest(self) -> bool {
        matches!(self, Self::Stopped | Self::Stopping)
    }
}

/// Snapshot of the tunnel lifecycle, persisted after every transition
/// and delivered to status subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelStatus {
    pub state: TunnelState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub last_updated: DateTime<Utc>,
    /// Remote ports carried by the running client configuration.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mapped_ports: Vec<u16>,
}

impl TunnelStatus {
    pub fn stopped(now: DateTime<Utc>) -> Self {
        Self {
            state: TunnelState::Stopped,
            started_at: None,
            last_error: None,
            last_updated: now,
            mapped_ports: Vec::new(),
        }
    }

    pub fn starting(mapped_ports: Vec<u16>, now: DateTime<Utc>) -> Self {
        Self {
            state: TunnelState::Starting,
            mapped_ports,
            ..Self::stopped(now)
        }
    }

    pub fn active(mapped_ports: Vec<u16>, now: DateTime<Utc>) -> Self {
        Self {
            state: TunnelState::Active,
            started_at: Some(now),
            mapped_ports,
            ..Self::stopped(now)
        }
    }

    /// Keeps `started_at` from the previous status, if it had one.
    pub fn stopping(previous: &TunnelStatus, now: DateTime<Utc>) -> Self {
        Self {
            state: TunnelState::Stopping,
            started_at: previous.started_at,
            mapped_ports: previous.mapped_ports.clone(),
            ..Self::stopped(now)
        }
    }

    pub fn error(message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            state: TunnelState::Error,
            last_error: Some(message.into()),
            ..Self::stopped(now)
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == TunnelState::Active
    }

    /// How long the tunnel has been up, if it is.
    pub fn uptime(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.started_at.map(|t| now - t)
    }
}

impl Default for TunnelStatus {
    fn default() -> Self {
        Self::stopped(Utc::now())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn constructors_keep_fields_consistent() {
        let now = Utc::now();
        let active = TunnelStatus::active(vec![6001], now);
        assert_eq!(active.started_at, Some(now));
        assert!(active.last_error.is_none());

        let stopping = TunnelStatus::stopping(&active, now);
        assert_eq!(stopping.started_at, Some(now));
        assert_eq!(stopping.mapped_ports, vec![6001]);

        let err = TunnelStatus::error("boom", now);
        assert!(err.started_at.is_none());
        assert!(err.mapped_ports.is_empty());
        assert_eq!(err.last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn state_parses_from_snake_case() {
        let s: TunnelState = "active".parse().unwrap();
        assert_eq!(s, TunnelState::Active);
        assert_eq!(TunnelState::Stopping.to_string(), "stopping");
    }

    #[test]
    fn error_is_neither_running_nor_at_rest() {
        assert!(TunnelState::Stopped.is_at_rest());
        assert!(TunnelState::Stopping.is_at_rest());
        assert!(TunnelState::Active.is_running());
        assert!(!TunnelState::Error.is_at_rest());
        assert!(!TunnelState::Error.is_running());
    }

    #[test]
    fn status_round_trips_through_json() {
        let status = TunnelStatus::error("login to server failed", Utc::now());
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "error");
        assert!(json.get("startedAt").is_none());
        let back: TunnelStatus = serde_json::from_value(json).unwrap();
        assert_eq!(back, status);
    }
}
