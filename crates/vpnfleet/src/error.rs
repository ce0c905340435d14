//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use vpnfleet_config::ConfigError;
use vpnfleet_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Management ───────────────────────────────────────────────────

    #[error("Management servers unreachable: {message}")]
    #[diagnostic(
        code(vpnfleet::unreachable),
        help(
            "Check that the OpenVPN processes are running and that their\n\
             management sockets listen where the configuration says.\n\
             Try: vpnfleet topology"
        )
    )]
    Unreachable { message: String },

    #[error("Management servers did not answer within {seconds}s")]
    #[diagnostic(
        code(vpnfleet::timeout),
        help("Increase the timeout with --timeout or node.management_timeout_secs.")
    )]
    Timeout { seconds: u64 },

    #[error("Management command failed: {message}")]
    #[diagnostic(code(vpnfleet::management))]
    Management { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(vpnfleet::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Invalid configuration: {field}: {reason}")]
    #[diagnostic(
        code(vpnfleet::invalid_config),
        help("Run: vpnfleet config validate")
    )]
    InvalidConfig { field: String, reason: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(vpnfleet::no_config),
        help(
            "Create it, or point --config / VPNFLEET_CONFIG at an existing file.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("No {what} configured")]
    #[diagnostic(
        code(vpnfleet::nothing_configured),
        help(
            "Add [[pools]] or [[servers]] entries to the configuration file.\n\
             Expected at: {path}"
        )
    )]
    NothingConfigured { what: String, path: String },

    #[error(transparent)]
    #[diagnostic(code(vpnfleet::config))]
    Config(Box<figment::Error>),

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(vpnfleet::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render {format} output: {message}")]
    #[diagnostic(code(vpnfleet::serialization))]
    Serialization { format: &'static str, message: String },
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::InvalidConfig { .. }
            | Self::NoConfig { .. }
            | Self::NothingConfigured { .. }
            | Self::Config(_) => exit_code::CONFIG,
            Self::Management { .. } | Self::Io(_) | Self::Serialization { .. } => {
                exit_code::GENERAL
            }
        }
    }

    pub(crate) fn serialization(format: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Serialization {
            format,
            message: err.to_string(),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::TransportError { message } => CliError::Unreachable { message },

            CoreError::ProtocolParseError { message } | CoreError::CommandRejected { message } => {
                CliError::Management { message }
            }

            other @ (CoreError::InvalidAddress { .. }
            | CoreError::FamilyMismatch { .. }
            | CoreError::RangeTooSmall { .. }
            | CoreError::InvalidSplitCount { .. }
            | CoreError::InsufficientAddressSpace { .. }
            | CoreError::Config { .. }) => CliError::InvalidConfig {
                field: "pools".into(),
                reason: other.to_string(),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::InvalidConfig { field, reason },
            ConfigError::Figment(err) => CliError::Config(err),
            ConfigError::Core(err) => err.into(),
            ConfigError::Io(err) => CliError::Io(err),
            ConfigError::Serialization(err) => CliError::serialization("TOML", err),
        }
    }
}
