//! Camera command handlers.

use tabled::Tabled;

use camtunnel_core::{CameraPatch, CameraRecord, CameraTunnelService, NewCamera};

use crate::cli::{CamerasArgs, CamerasCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct CameraRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Local")]
    local: String,
    #[tabled(rename = "Remote Port")]
    remote_port: u16,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
}

impl From<&CameraRecord> for CameraRow {
    fn from(c: &CameraRecord) -> Self {
        Self {
            id: c.id.to_string(),
            name: c.name.clone(),
            local: c.local_address(),
            remote_port: c.remote_port,
            path: c.stream_path.clone().unwrap_or_else(|| "-".into()),
            enabled: if c.enabled { "yes" } else { "no" }.into(),
        }
    }
}

fn detail(c: &CameraRecord) -> String {
    [
        format!("ID:          {}", c.id),
        format!("Name:        {}", c.name),
        format!("Local:       {}", c.local_address()),
        format!("Remote port: {}", c.remote_port),
        format!("Stream path: {}", c.stream_path.as_deref().unwrap_or("-")),
        format!("Enabled:     {}", c.enabled),
        format!("Created:     {}", c.created_at.to_rfc3339()),
    ]
    .join("\n")
}

fn print_camera(c: &CameraRecord, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_single(&global.output, c, detail, |c| c.id.to_string())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    service: &CameraTunnelService,
    args: CamerasArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        CamerasCommand::List => {
            let cameras = service.get_cameras().await?;
            let out = output::render_list(
                &global.output,
                &cameras,
                |c| CameraRow::from(c),
                |c| c.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CamerasCommand::Get { id } => {
            let camera = service.get_camera(&util::camera_id(&id)?).await?;
            print_camera(&camera, global)
        }

        CamerasCommand::Add {
            name,
            local_ip,
            remote_port,
            local_port,
            id,
            stream_path,
            disabled,
        } => {
            let mut input = NewCamera::new(name, local_ip, remote_port).with_enabled(!disabled);
            if let Some(id) = id {
                input = input.with_id(util::camera_id(&id)?);
            }
            if let Some(port) = local_port {
                input = input.with_local_port(port);
            }
            if let Some(path) = stream_path {
                input = input.with_stream_path(path);
            }
            let camera = service.add_camera(input).await?;
            print_camera(&camera, global)
        }

        CamerasCommand::Update {
            id,
            name,
            local_ip,
            local_port,
            remote_port,
            stream_path,
        } => {
            let patch = CameraPatch {
                name,
                local_ip,
                local_port,
                remote_port,
                enabled: None,
                stream_path,
            };
            if patch.is_empty() {
                return Err(CliError::Validation {
                    field: "update".into(),
                    reason: "nothing to change; pass at least one field flag".into(),
                });
            }
            let camera = service
                .update_camera(&util::camera_id(&id)?, &patch)
                .await?;
            print_camera(&camera, global)
        }

        CamerasCommand::Enable { id } => set_enabled(service, &id, true, global).await,
        CamerasCommand::Disable { id } => set_enabled(service, &id, false, global).await,

        CamerasCommand::Remove { id } => {
            let id = util::camera_id(&id)?;
            if !util::confirm(&format!("Remove camera '{id}'?"), global.yes)? {
                return Ok(());
            }
            let removed = service.remove_camera(&id).await?;
            if !global.quiet {
                if removed {
                    eprintln!("Camera '{id}' removed");
                } else {
                    eprintln!("Camera '{id}' was not registered");
                }
            }
            Ok(())
        }

        CamerasCommand::Probe { id } => {
            let id = util::camera_id(&id)?;
            let report = service.probe_camera(&id).await?;
            let out = output::render_single(
                &global.output,
                &report,
                |r| {
                    let mark = if r.reachable { "✓" } else { "✗" };
                    format!("{mark} {}", r.message)
                },
                |r| r.reachable.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

async fn set_enabled(
    service: &CameraTunnelService,
    id: &str,
    enabled: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let camera = service
        .update_camera(&util::camera_id(id)?, &CameraPatch::enabled(enabled))
        .await?;
    if !global.quiet {
        let verb = if enabled { "enabled" } else { "disabled" };
        eprintln!("Camera '{}' {verb}; restart the tunnel to apply", camera.id);
    }
    Ok(())
}
