//! Shared helpers for command handlers.

use std::io::IsTerminal;

use camtunnel_core::CameraId;

use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Without a terminal there is nobody to ask, so the operation is refused
/// instead of hanging on a prompt.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.trim_end_matches('?').to_owned(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(prompt_err)
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

pub fn camera_id(raw: &str) -> Result<CameraId, CliError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CliError::Validation {
            field: "id".into(),
            reason: "camera id must not be empty".into(),
        });
    }
    Ok(CameraId::from(trimmed))
}

/// Parse a settings value: JSON when it parses, otherwise a bare string.
pub fn parse_setting_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn setting_values_prefer_json() {
        assert_eq!(parse_setting_value("true"), json!(true));
        assert_eq!(parse_setting_value("42"), json!(42));
        assert_eq!(parse_setting_value("debug"), json!("debug"));
        assert_eq!(parse_setting_value(r#"{"a":1}"#), json!({ "a": 1 }));
    }

    #[test]
    fn blank_camera_id_rejected() {
        assert!(camera_id("  ").is_err());
        assert_eq!(camera_id(" cam_1 ").ok().map(|id| id.to_string()), Some("cam_1".into()));
    }
}
