//! Clap derive structures for the `twinkly` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// twinkly -- manage a fleet of Twinkly LED controllers
#[derive(Debug, Parser)]
#[command(
    name = "twinkly",
    version,
    about = "Manage Twinkly LED controllers from the command line",
    long_about = "Register Twinkly devices on the local network, switch them on and off,\n\
        set brightness, call arbitrary xled/v1 methods and watch their\n\
        status reports.",
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
    #[arg(long, env = "TWINKLY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Registry file (overrides registry.path)
    #[arg(long, short = 'r', env = "TWINKLY_REGISTRY", global = true)]
    pub registry: Option<PathBuf>,

    /// Output format (overrides defaults.output)
    #[arg(long, short = 'o', env = "TWINKLY_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// Per-request device timeout in seconds (overrides defaults.timeout)
    #[arg(long, env = "TWINKLY_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output ───────────────────────────────────────────────────────────

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
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List registered devices
    #[command(alias = "ls")]
    List,

    /// Register the device at ADDRESS
    Add {
        /// Device address (host or host:port)
        address: String,
    },

    /// Deregister the device at ADDRESS
    #[command(alias = "rm")]
    Remove {
        /// Device address as registered
        address: String,
    },

    /// Show a device's self-description without registering it
    Info {
        /// Device address (host or host:port)
        address: String,
    },

    /// Call an arbitrary xled/v1 method through an authenticated session
    Call(CallArgs),

    /// Switch a registered device on or off
    Mode {
        /// Registry index or address
        device: String,
        /// Desired state
        state: PowerState,
    },

    /// Set a registered device's brightness
    Brightness {
        /// Registry index or address
        device: String,
        /// Brightness in percent (sent as-is)
        #[arg(allow_negative_numbers = true)]
        percent: i64,
    },

    /// Resubscribe registered devices and print status events
    Watch,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Device address (host or host:port)
    pub address: String,

    /// Method path under /xled/v1/, e.g. `led/effects`
    pub method: String,

    /// JSON body; without one the call is a GET
    pub payload: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PowerState {
    On,
    Off,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
