// ── Core error types ──
//
// User-facing errors from camtunnel-core. Storage and process failures
// are translated into domain variants here; consumers never see raw
// serde or io errors.

use serde::Serialize;
use strum::Display;
use thiserror::Error;

use crate::model::TunnelState;
use crate::store::StoreError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Input errors ─────────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    // ── State errors ─────────────────────────────────────────────────
    #[error("Precondition failed: {message}")]
    Precondition { message: String },

    #[error("Tunnel is not active (current state: {state})")]
    TunnelNotActive { state: TunnelState },

    // ── Tunnel-client errors ─────────────────────────────────────────
    #[error("Tunnel client error: {message}")]
    Process { message: String },

    #[error("{operation} timed out after {timeout_secs}s")]
    Timeout {
        operation: String,
        timeout_secs: u64,
    },

    // ── Persistence errors ───────────────────────────────────────────
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Discriminant of [`CoreError`], for callers that branch on the kind of
/// failure rather than its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Precondition,
    TunnelNotActive,
    Process,
    Timeout,
    Storage,
    Internal,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Precondition { .. } => ErrorKind::Precondition,
            Self::TunnelNotActive { .. } => ErrorKind::TunnelNotActive,
            Self::Process { .. } => ErrorKind::Process,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    pub(crate) fn camera_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Camera".into(),
            identifier: identifier.into(),
        }
    }
}

// ── Conversion from storage-layer errors ─────────────────────────────

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        CoreError::Storage {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = CoreError::TunnelNotActive {
            state: TunnelState::Stopped,
        };
        assert_eq!(err.kind(), ErrorKind::TunnelNotActive);
        assert_eq!(err.kind().to_string(), "tunnel_not_active");
        assert_eq!(
            err.to_string(),
            "Tunnel is not active (current state: stopped)"
        );
    }

    #[test]
    fn store_errors_become_storage() {
        let err: CoreError = StoreError::Backend("disk full".into()).into();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(err.to_string().contains("disk full"));
    }
}
