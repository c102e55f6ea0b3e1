//! Settings command handlers.

use camtunnel_core::{AppSettings, CameraTunnelService};

use crate::cli::{GlobalOpts, SettingsArgs, SettingsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

fn detail(s: &AppSettings) -> String {
    let mut lines = vec![
        format!("autoStart:     {}", s.auto_start),
        format!("notifications: {}", s.notifications),
        format!("logLevel:      {}", s.log_level),
    ];
    for (key, value) in &s.extra {
        lines.push(format!("{key}: {value}"));
    }
    lines.join("\n")
}

pub async fn handle(
    service: &CameraTunnelService,
    args: SettingsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        SettingsCommand::Show => {
            let settings = service.settings().await?;
            let out = output::render_single(&global.output, &settings, detail, |s| {
                s.auto_start.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SettingsCommand::Set { key, value } => {
            let mut settings = service.settings().await?;
            settings
                .set(&key, util::parse_setting_value(&value))
                .map_err(|reason| CliError::Validation {
                    field: key.clone(),
                    reason,
                })?;
            service.save_settings(&settings).await?;
            if !global.quiet {
                eprintln!("Setting '{key}' updated");
            }
            Ok(())
        }
    }
}
