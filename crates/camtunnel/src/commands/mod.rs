//! Command dispatch: bridges CLI args -> service calls -> output formatting.

pub mod backup;
pub mod cameras;
pub mod config_cmd;
pub mod relay;
pub mod settings;
pub mod tunnel;
pub mod util;

use camtunnel_core::CameraTunnelService;

use crate::cli::{Command, GlobalOpts};
use crate::config::Config;
use crate::error::CliError;

/// Dispatch a store-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    service: &CameraTunnelService,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Cameras(args) => cameras::handle(service, args, global).await,
        Command::Relay(args) => relay::handle(service, args, cfg, global).await,
        Command::Tunnel(args) => tunnel::handle(service, args, global).await,
        Command::Settings(args) => settings::handle(service, args, global).await,
        Command::Backup(args) => backup::handle(service, args, global).await,
        Command::Reset { force } => reset(service, force, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command does not use the camera store".into(),
        )),
    }
}

async fn reset(
    service: &CameraTunnelService,
    force: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let recorded = service.recorded_status().await?;
    if recorded.state.is_running() && !force {
        return Err(CliError::Precondition {
            message: format!(
                "the recorded tunnel status is '{}'; stop `camtunnel tunnel up` first or pass --force",
                recorded.state
            ),
        });
    }
    if !util::confirm(
        "Delete all cameras, relay settings and recorded status?",
        global.yes,
    )? {
        return Ok(());
    }
    service.clear_all_data().await?;
    if !global.quiet {
        eprintln!("All camtunnel data cleared");
    }
    Ok(())
}
