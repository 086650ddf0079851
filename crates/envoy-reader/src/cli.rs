//! Clap derive structures for the `envoy-reader` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// envoy-reader -- read live telemetry from Enphase Envoy gateways
#[derive(Debug, Parser)]
#[command(
    name = "envoy-reader",
    version,
    about = "Read solar production, consumption, grid and battery data from Enphase Envoy gateways",
    long_about = "Talks to an Enphase Envoy / IQ Gateway on the local network.\n\n\
        Older firmware is read without authentication. Firmware 7 and later\n\
        needs a token, minted through an Enlighten account or supplied directly.",
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
    /// Gateway profile to use
    #[arg(long, short = 'p', env = "ENVOY_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Gateway address (overrides profile)
    #[arg(long, short = 'a', env = "ENVOY_ADDRESS", global = true)]
    pub address: Option<String>,

    /// Gateway serial number (overrides discovery)
    #[arg(long, env = "ENVOY_SERIAL", global = true)]
    pub serial: Option<String>,

    /// Enlighten account email
    #[arg(long, short = 'u', env = "ENVOY_USERNAME", global = true, hide_env = true)]
    pub username: Option<String>,

    /// Output format [default: table, or `defaults.output` from config]
    #[arg(long, short = 'o', env = "ENVOY_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds [default: 10, or `defaults.timeout`]
    #[arg(long, env = "ENVOY_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

impl GlobalOpts {
    pub fn format(&self) -> OutputFormat {
        self.output.unwrap_or(OutputFormat::Table)
    }
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

/// Telemetry categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Category {
    Production,
    Consumption,
    /// Net grid import / export
    Grid,
    Inverters,
    Battery,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Discover and probe the gateway, then print its profile
    Info,

    /// Obtain an access token for the gateway
    Login(LoginArgs),

    /// Read one or more telemetry categories once
    #[command(alias = "r")]
    Read(ReadArgs),

    /// Poll telemetry on an interval until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Manage CLI configuration and gateway profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Command Arguments ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Print the raw token
    #[arg(long)]
    pub show_token: bool,

    /// Ask the gateway whether it accepts the token
    #[arg(long)]
    pub verify: bool,
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    /// Categories to read (default: all)
    #[arg(value_enum)]
    pub categories: Vec<Category>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Categories to read (default: all)
    #[arg(value_enum)]
    pub categories: Vec<Category>,

    /// Poll interval (e.g. "30s", "5m")
    #[arg(long, short = 'i', default_value = "30s")]
    pub interval: humantime::Duration,

    /// Stop after this many poll cycles
    #[arg(long, short = 'n')]
    pub count: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display current configuration (secrets masked)
    Show,

    /// Store an Enlighten password in the system keyring
    SetPassword {
        /// Gateway profile name (defaults to active profile)
        #[arg(long)]
        gateway: Option<String>,
    },

    /// Set the default gateway profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
