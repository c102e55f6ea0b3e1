//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use camtunnel_config::ConfigError;
use camtunnel_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(camtunnel::not_found),
        help("Run: camtunnel {list_command} to see what is registered")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── State ────────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(camtunnel::precondition))]
    Precondition { message: String },

    #[error("Tunnel is not active (current state: {state})")]
    #[diagnostic(
        code(camtunnel::tunnel_not_active),
        help("Start it with: camtunnel tunnel up")
    )]
    TunnelNotActive { state: String },

    // ── Tunnel client ────────────────────────────────────────────────
    #[error("Tunnel client failed: {message}")]
    #[diagnostic(
        code(camtunnel::tunnel_client),
        help(
            "Check that frpc is installed and the relay host, port and token are correct.\n\
             Run with -vv to see the client's own log lines."
        )
    )]
    TunnelClient { message: String },

    #[error("{operation} timed out after {seconds}s")]
    #[diagnostic(
        code(camtunnel::timeout),
        help("Raise frpc.start_timeout / frpc.stop_timeout in the config file.")
    )]
    Timeout { operation: String, seconds: u64 },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(camtunnel::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(camtunnel::config),
        help("Inspect the file with: camtunnel config show")
    )]
    Config(#[from] ConfigError),

    #[error("Storage error: {message}")]
    #[diagnostic(
        code(camtunnel::storage),
        help("Check permissions on the data directory (--data-dir).")
    )]
    Storage { message: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(camtunnel::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(camtunnel::internal))]
    Internal(String),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(camtunnel::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Precondition { .. } | Self::TunnelNotActive { .. } => exit_code::CONFLICT,
            Self::TunnelClient { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } | Self::Json(_) => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::NotFound {
                entity_type,
                identifier,
            } => CliError::NotFound {
                list_command: format!("{}s list", entity_type.to_lowercase()),
                resource_type: entity_type,
                identifier,
            },

            CoreError::Precondition { message } => CliError::Precondition { message },

            CoreError::TunnelNotActive { state } => CliError::TunnelNotActive {
                state: state.to_string(),
            },

            CoreError::Process { message } => CliError::TunnelClient { message },

            CoreError::Timeout {
                operation,
                timeout_secs,
            } => CliError::Timeout {
                operation,
                seconds: timeout_secs,
            },

            CoreError::Storage { message } => CliError::Storage { message },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
