//! Clap derive structures for the `camtunnel` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// camtunnel -- publish LAN RTSP cameras through an frp relay
#[derive(Debug, Parser)]
#[command(
    name = "camtunnel",
    version,
    about = "Expose local RTSP cameras through an frp relay",
    long_about = "Keeps a registry of LAN cameras, generates the frpc client\n\
        configuration for them, and runs the tunnel in the foreground so\n\
        each camera is reachable at rtsp://<relay>:<remote port>/.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "CAMTUNNEL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory for cameras, relay settings and tunnel status
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CAMTUNNEL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage the camera registry
    #[command(alias = "cam", alias = "c")]
    Cameras(CamerasArgs),

    /// Configure the frp relay server
    Relay(RelayArgs),

    /// Run the tunnel and inspect its status
    #[command(alias = "t")]
    Tunnel(TunnelArgs),

    /// View and change application settings
    Settings(SettingsArgs),

    /// Export or import the full configuration
    Backup(BackupArgs),

    /// Delete all cameras, relay settings and recorded status
    Reset {
        /// Clear even if the recorded status says a tunnel is running
        #[arg(long)]
        force: bool,
    },

    /// Manage the CLI configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CAMERAS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CamerasArgs {
    #[command(subcommand)]
    pub command: CamerasCommand,
}

#[derive(Debug, Subcommand)]
pub enum CamerasCommand {
    /// List registered cameras
    #[command(alias = "ls")]
    List,

    /// Show one camera
    Get {
        /// Camera ID
        id: String,
    },

    /// Register a camera
    Add {
        /// Display name
        #[arg(long)]
        name: String,

        /// Camera host or IP on the local network
        #[arg(long = "ip", value_name = "HOST")]
        local_ip: String,

        /// Public port on the relay
        #[arg(long, short = 'r')]
        remote_port: u16,

        /// RTSP port on the camera
        #[arg(long, short = 'l')]
        local_port: Option<u16>,

        /// Explicit ID (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Stream path appended to the public URL, e.g. `stream1`
        #[arg(long)]
        stream_path: Option<String>,

        /// Register without exposing it
        #[arg(long)]
        disabled: bool,
    },

    /// Change fields of a camera
    Update {
        /// Camera ID
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long = "ip", value_name = "HOST")]
        local_ip: Option<String>,

        #[arg(long, short = 'l')]
        local_port: Option<u16>,

        #[arg(long, short = 'r')]
        remote_port: Option<u16>,

        #[arg(long)]
        stream_path: Option<String>,
    },

    /// Include a camera in the tunnel
    Enable {
        /// Camera ID
        id: String,
    },

    /// Exclude a camera from the tunnel
    Disable {
        /// Camera ID
        id: String,
    },

    /// Unregister a camera
    #[command(alias = "rm")]
    Remove {
        /// Camera ID
        id: String,
    },

    /// Check that a camera answers on the local network
    Probe {
        /// Camera ID
        id: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  RELAY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct RelayArgs {
    #[command(subcommand)]
    pub command: RelayCommand,
}

#[derive(Debug, Subcommand)]
pub enum RelayCommand {
    /// Show the relay server settings
    Show,

    /// Set the relay server
    Set {
        /// frps host name or IP
        #[arg(long)]
        host: String,

        /// frps control port
        #[arg(long, short = 'p', default_value_t = camtunnel_core::DEFAULT_CONTROL_PORT)]
        port: u16,

        /// Auth token (falls back to the configured token sources)
        #[arg(long, conflicts_with = "ask_token")]
        token: Option<String>,

        /// Prompt for the auth token
        #[arg(long)]
        ask_token: bool,

        /// Host viewers connect to, when it differs from the relay host
        #[arg(long)]
        public_host: Option<String>,

        /// Save the relay but keep it out of use
        #[arg(long)]
        disabled: bool,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  TUNNEL
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct TunnelArgs {
    #[command(subcommand)]
    pub command: TunnelCommand,
}

#[derive(Debug, Subcommand)]
pub enum TunnelCommand {
    /// Start the tunnel and keep it running until interrupted
    Up,

    /// Show the recorded tunnel status
    Status,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SETTINGS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Show all settings
    Show,

    /// Set one setting by its stored name, e.g. `autoStart true`
    Set {
        key: String,

        /// JSON value; bare words are taken as strings
        value: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  BACKUP
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct BackupArgs {
    #[command(subcommand)]
    pub command: BackupCommand,
}

#[derive(Debug, Subcommand)]
pub enum BackupCommand {
    /// Write the configuration as JSON
    Export {
        /// Destination file (stdout when omitted)
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },

    /// Apply a previously exported configuration
    Import {
        /// JSON file produced by `backup export`
        file: PathBuf,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show,

    /// Print the config file path
    Path,

    /// Store the relay token in the system keyring
    SetToken,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
