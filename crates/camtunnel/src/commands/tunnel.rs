//! Tunnel command handlers.
//!
//! `up` owns the frpc process for as long as it runs; every other command
//! only reads what it recorded.

use std::time::Duration;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tabled::Tabled;
use tokio_stream::StreamExt;

use camtunnel_core::{CameraTunnelService, TunnelState, TunnelStatus};

use crate::cli::{GlobalOpts, TunnelArgs, TunnelCommand};
use crate::error::CliError;
use crate::output;

// ── Rows ────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StreamEntry {
    id: String,
    name: String,
    url: String,
}

#[derive(Tabled)]
struct StreamRow {
    #[tabled(rename = "Camera")]
    name: String,
    #[tabled(rename = "Stream URL")]
    url: String,
}

fn uptime(status: &TunnelStatus) -> Option<String> {
    let elapsed = status.uptime(Utc::now())?;
    let secs = u64::try_from(elapsed.num_seconds()).unwrap_or(0);
    Some(humantime::format_duration(Duration::from_secs(secs)).to_string())
}

fn status_detail(status: &TunnelStatus, color: bool) -> String {
    let mut lines = vec![format!(
        "State:   {}",
        output::paint_state(status.state, color)
    )];
    if let Some(up) = uptime(status) {
        lines.push(format!("Uptime:  {up}"));
    }
    if !status.mapped_ports.is_empty() {
        let ports: Vec<String> = status.mapped_ports.iter().map(ToString::to_string).collect();
        lines.push(format!("Ports:   {}", ports.join(", ")));
    }
    if let Some(ref err) = status.last_error {
        lines.push(format!("Error:   {err}"));
    }
    lines.push(format!("Updated: {}", status.last_updated.to_rfc3339()));
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    service: &CameraTunnelService,
    args: TunnelArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        TunnelCommand::Status => {
            let color = output::should_color(&global.color);
            let status = service.recorded_status().await?;
            let out = output::render_single(
                &global.output,
                &status,
                |s| status_detail(s, color),
                |s| s.state.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        TunnelCommand::Up => {
            let result = run_foreground(service, global).await;
            service.shutdown().await;
            if result.is_ok() && !global.quiet {
                eprintln!("Tunnel stopped");
            }
            result
        }
    }
}

async fn run_foreground(
    service: &CameraTunnelService,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    service.init().await?;

    let spinner = (!global.quiet).then(|| {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            pb.set_style(style);
        }
        pb.set_message("Connecting to relay...");
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    });
    let started = service.tunnel().start().await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    started?;

    // Subscribe before re-checking so a crash right after login is not missed.
    let mut updates = service.status_stream();
    let status = service.get_tunnel_status();
    if !status.is_active() {
        return Err(exit_error(&status));
    }

    let streams: Vec<StreamEntry> = service
        .resolver()
        .resolve_all()
        .await?
        .into_iter()
        .map(|(camera, url)| StreamEntry {
            id: camera.id.to_string(),
            name: camera.name,
            url: url.to_string(),
        })
        .collect();
    let out = output::render_list(
        &global.output,
        &streams,
        |s| StreamRow {
            name: s.name.clone(),
            url: s.url.clone(),
        },
        |s| s.url.clone(),
    )?;
    output::print_output(&out, global.quiet);
    if !global.quiet {
        eprintln!(
            "Tunnel {}; press Ctrl-C to stop",
            output::paint_state(TunnelState::Active, color)
        );
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("interrupt received; stopping tunnel");
                return Ok(());
            }
            next = updates.next() => {
                let Some(status) = next else {
                    return Ok(());
                };
                if !global.quiet {
                    eprintln!("Tunnel {}", output::paint_state(status.state, color));
                }
                if status.state == TunnelState::Error {
                    return Err(exit_error(&status));
                }
            }
        }
    }
}

fn exit_error(status: &TunnelStatus) -> CliError {
    CliError::TunnelClient {
        message: status
            .last_error
            .clone()
            .unwrap_or_else(|| format!("tunnel is {}", status.state)),
    }
}
