//! Clap derive structures for the `vpnfleet` CLI.
//!
//! Defines the command tree, global flags, and shared output enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// vpnfleet -- plan, generate and operate OpenVPN server pools
#[derive(Debug, Parser)]
#[command(
    name = "vpnfleet",
    version,
    about = "Plan, generate and operate OpenVPN server pools",
    long_about = "Derives per-instance address plans from pool definitions, renders\n\
        OpenVPN server configurations and iptables-restore rules, and talks to\n\
        every running server over its management socket.",
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
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, env = "VPNFLEET_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "VPNFLEET_OUTPUT",
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

    /// Management connect/command timeout in seconds (overrides the config)
    #[arg(long, env = "VPNFLEET_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
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
    /// Show the planned instances of every pool
    #[command(alias = "topo")]
    Topology,

    /// Render server configurations or firewall rules
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// List connected sessions on every server
    #[command(alias = "st")]
    Status,

    /// Show the OpenVPN version of every server
    Version,

    /// Show client count and traffic totals of every server
    LoadStats,

    /// Disconnect a common name from every server
    Kill(KillArgs),

    /// Inspect the configuration file
    #[command(alias = "cfg")]
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Generate ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GenerateArgs {
    #[command(subcommand)]
    pub command: GenerateCommand,
}

#[derive(Debug, Subcommand)]
pub enum GenerateCommand {
    /// One OpenVPN server configuration per instance
    ServerConfig {
        /// Write `<pool>-<index>.conf` files here instead of printing
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// iptables-restore rules for IPv4 and IPv6
    Firewall {
        /// Write `iptables` and `ip6tables` here instead of printing
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

// ── Kill ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct KillArgs {
    /// Certificate common name whose sessions are disconnected
    pub common_name: String,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the configuration file path
    Path,
    /// Print the effective configuration (file plus environment overrides)
    Show,
    /// Check pools, addresses and servers without touching anything
    Validate,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
