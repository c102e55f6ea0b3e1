//! Relay command handlers.

use secrecy::ExposeSecret;
use serde::Serialize;

use camtunnel_core::{CameraTunnelService, RelayServerConfig};

use crate::cli::{GlobalOpts, RelayArgs, RelayCommand};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

use super::util;

/// What `relay show` prints. The token itself never leaves the store.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayView {
    host: String,
    port: u16,
    public_host: String,
    enabled: bool,
    token_set: bool,
}

impl From<&RelayServerConfig> for RelayView {
    fn from(r: &RelayServerConfig) -> Self {
        Self {
            host: r.host.clone(),
            port: r.port,
            public_host: r.public_host().to_owned(),
            enabled: r.enabled,
            token_set: r.token.as_deref().is_some_and(|t| !t.is_empty()),
        }
    }
}

fn detail(r: &RelayView) -> String {
    [
        format!("Host:        {}", r.host),
        format!("Port:        {}", r.port),
        format!("Public host: {}", r.public_host),
        format!("Enabled:     {}", r.enabled),
        format!("Token:       {}", if r.token_set { "set" } else { "none" }),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    service: &CameraTunnelService,
    args: RelayArgs,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        RelayCommand::Show => {
            let Some(relay) = service.relay_config().await? else {
                return Err(CliError::Precondition {
                    message: "no relay server configured; set one with `camtunnel relay set`"
                        .into(),
                });
            };
            let view = RelayView::from(&relay);
            let out = output::render_single(&global.output, &view, detail, |r| {
                format!("{}:{}", r.host, r.port)
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RelayCommand::Set {
            host,
            port,
            token,
            ask_token,
            public_host,
            disabled,
        } => {
            let token = if ask_token {
                Some(rpassword::prompt_password("Relay token: ").map_err(util::prompt_err)?)
            } else {
                token.or_else(|| {
                    config::resolve_relay_token(cfg).map(|s| s.expose_secret().to_owned())
                })
            };

            let mut relay = RelayServerConfig::new(host.trim(), port);
            relay.enabled = !disabled;
            if let Some(token) = token.filter(|t| !t.is_empty()) {
                relay = relay.with_token(token);
            }
            if let Some(public) = public_host.filter(|h| !h.trim().is_empty()) {
                relay = relay.with_public_host(public.trim());
            }

            service.save_relay_config(&relay).await?;
            if !global.quiet {
                eprintln!("Relay set to {}:{}", relay.host, relay.port);
            }
            Ok(())
        }
    }
}
