//! Backup command handlers.

use camtunnel_core::{CameraTunnelService, ConfigSnapshot};

use crate::cli::{BackupArgs, BackupCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    service: &CameraTunnelService,
    args: BackupArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        BackupCommand::Export { file } => {
            let snapshot = service.export_config().await?;
            let body = output::render_json(&snapshot, false)?;
            match file {
                Some(path) => {
                    std::fs::write(&path, body)?;
                    if !global.quiet {
                        eprintln!("Configuration exported to {}", path.display());
                    }
                }
                None => output::print_output(&body, global.quiet),
            }
            Ok(())
        }

        BackupCommand::Import { file } => {
            let contents = std::fs::read_to_string(&file)?;
            let snapshot: ConfigSnapshot = serde_json::from_str(&contents)?;
            let report = service.import_config(snapshot).await?;
            let out = output::render_single(
                &global.output,
                &report,
                |r| {
                    let cameras = r
                        .cameras
                        .map_or_else(|| "unchanged".to_owned(), |n| format!("{n} imported"));
                    [
                        format!("Cameras:  {cameras}"),
                        format!("Relay:    {}", if r.relay_config { "imported" } else { "unchanged" }),
                        format!("Settings: {}", if r.settings { "imported" } else { "unchanged" }),
                    ]
                    .join("\n")
                },
                |r| r.cameras.unwrap_or(0).to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
