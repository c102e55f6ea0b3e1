//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init { force } => {
            let path = config::config_file(global);
            if path.exists() && !force {
                return Err(CliError::Precondition {
                    message: format!(
                        "{} already exists; pass --force to overwrite it",
                        path.display()
                    ),
                });
            }
            let mut cfg = Config::default();
            if let Some(ref dir) = global.data_dir {
                cfg.data_dir.clone_from(dir);
            }
            config::save_config_to(&cfg, &path)?;
            if !global.quiet {
                eprintln!("✓ Configuration written to {}", path.display());
            }
            Ok(())
        }

        ConfigCommand::Show => {
            let mut cfg = config::load(global)?;
            if cfg.relay.token.is_some() {
                cfg.relay.token = Some("********".into());
            }
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("{c:#?}\n({e})")),
                |_| config::config_file(global).display().to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(
                &config::config_file(global).display().to_string(),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::SetToken => {
            let token = rpassword::prompt_password("Relay token: ").map_err(util::prompt_err)?;
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "token cannot be empty".into(),
                });
            }
            config::store_relay_token(&token)?;
            if !global.quiet {
                eprintln!("✓ Relay token stored in system keyring");
            }
            Ok(())
        }
    }
}
