//! Clap derive structures for the `bacreg` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// bacreg -- discover BACnet devices and edit their point registries
#[derive(Debug, Parser)]
#[command(
    name = "bacreg",
    version,
    about = "Discover BACnet devices and edit their point registries",
    long_about = "Scans a platform's BACnet proxy for devices, collects their points \
        into registries, and edits, imports, exports and saves those registries.\n\n\
        Registry files are plain CSV and can be edited offline.",
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
    /// Platform profile to use
    #[arg(long, short = 'p', env = "BACREG_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Platform URL (overrides profile)
    #[arg(long, env = "BACREG_PLATFORM", global = true)]
    pub platform: Option<String>,

    /// Platform instance UUID (overrides profile)
    #[arg(long, env = "BACREG_PLATFORM_UUID", global = true)]
    pub platform_uuid: Option<String>,

    /// Session token (overrides the credential chain)
    #[arg(long, env = "BACREG_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "BACREG_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Disable color output (same as --color never)
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "BACREG_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "BACREG_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

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
    /// Comma-separated values with a header row
    Csv,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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
    /// Scan the network for devices
    #[command(alias = "s")]
    Scan(ScanArgs),

    /// Fetch, inspect, edit and save point registries
    #[command(alias = "reg", alias = "r")]
    Registry(RegistryArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SCAN
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Scan bounds shared by `scan` and `registry fetch`.
#[derive(Debug, Clone, Args)]
pub struct ScanArgs {
    /// Lowest device instance to scan
    #[arg(long, value_name = "ID")]
    pub low: Option<u32>,

    /// Highest device instance to scan
    #[arg(long, value_name = "ID")]
    pub high: Option<u32>,

    /// Only ask this address
    #[arg(long, value_name = "ADDRESS")]
    pub address: Option<String>,

    /// Seconds the proxy listens for replies
    #[arg(long, value_name = "SECONDS")]
    pub scan_length: Option<u32>,

    /// Give up on the scan after this many milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  REGISTRY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct RegistryArgs {
    #[command(subcommand)]
    pub command: RegistryCommand,
}

#[derive(Debug, Subcommand)]
pub enum RegistryCommand {
    /// Collect a device's points from the platform
    Fetch {
        /// Device instance number
        device_id: u32,

        /// Device address
        #[arg(long)]
        address: String,

        /// Write the registry to this file instead of printing it
        #[arg(long, short = 'f', value_name = "FILE")]
        file: Option<PathBuf>,

        /// Give up after this many milliseconds
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
    },

    /// Show a registry file
    #[command(alias = "cat")]
    Show {
        /// Registry CSV file
        file: PathBuf,

        /// Only show rows whose cell in --column contains TERM
        #[arg(long, value_name = "TERM")]
        filter: Option<String>,

        /// Column the filter looks at (0 is the point name)
        #[arg(long, default_value = "0")]
        column: usize,

        /// List the columns instead of the rows
        #[arg(long)]
        columns: bool,
    },

    /// Edit a registry file
    ///
    /// Operations run grouped by kind, in this order: add-column,
    /// clone-column, remove-column, add-point, remove-point, set,
    /// replace-all.
    Edit(EditArgs),

    /// Save a registry file to the platform
    Push {
        /// Registry CSV file
        file: PathBuf,

        /// Device instance number
        #[arg(long)]
        device_id: String,

        /// Device address
        #[arg(long)]
        address: String,

        /// Agent that receives the registry
        #[arg(long, value_name = "IDENTITY")]
        agent: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Registry CSV file
    pub file: PathBuf,

    /// Insert an empty column after column AFTER
    #[arg(long, value_name = "AFTER:LABEL")]
    pub add_column: Vec<String>,

    /// Insert a copy of column AFTER right after it
    #[arg(long, value_name = "AFTER:LABEL")]
    pub clone_column: Vec<String>,

    /// Remove column N
    #[arg(long, value_name = "N")]
    pub remove_column: Vec<usize>,

    /// Append a point with an empty row
    #[arg(long, value_name = "NAME")]
    pub add_point: Vec<String>,

    /// Remove the point with this name
    #[arg(long, value_name = "NAME")]
    pub remove_point: Vec<String>,

    /// Set one cell
    #[arg(long, value_name = "ROW:COL=VALUE")]
    pub set: Vec<String>,

    /// Replace the first FIND in every matching cell of column COL
    #[arg(long, value_name = "COL:FIND=REPLACE")]
    pub replace_all: Vec<String>,

    /// Write here instead of overwriting FILE
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
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
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (secrets redacted)
    Show,

    /// Set a value on the active profile
    Set {
        /// Profile key (e.g., "platform", "platform_uuid", "insecure")
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Print the config file path
    Path,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
