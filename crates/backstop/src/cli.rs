//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Backstop - run flaky commands under a retry policy
#[derive(Parser, Debug)]
#[command(name = "backstop")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory holding config.yaml (default: ~/.backstop)
    #[arg(long, global = true, env = "BACKSTOP_CONFIG_DIR")]
    pub config_dir: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command, retrying it until it succeeds or the policy gives up
    Run(RunArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Show version information
    Version(VersionArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// Run command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Action phrase used in logs and per-action config (e.g. "uploading image")
    #[arg(short, long)]
    pub action: Option<String>,

    /// Retries allowed after the first attempt
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Give up after this many seconds (0 disables the deadline)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Backoff multiplier applied after each wait
    #[arg(long, value_name = "FACTOR")]
    pub backoff: Option<f64>,

    /// First wait in milliseconds
    #[arg(long, value_name = "MS")]
    pub delay: Option<u64>,

    /// Exit codes worth retrying (default: any non-zero code)
    #[arg(long = "retry-on", value_name = "CODE")]
    pub retry_on: Vec<i32>,

    /// Command to run, after `--`
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

// Config commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write the built-in defaults to config.yaml
    Init(ConfigInitArgs),

    /// Show resolved configuration
    Show(ConfigShowArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Show the effective defaults for one action
    #[arg(short, long)]
    pub action: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// Version command
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
