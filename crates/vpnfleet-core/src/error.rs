// ── Core error types ──
//
// Errors surfaced by address planning, generation and fleet control.
// Derivation errors (addresses, topology) fail fast; fleet errors are
// collected per server and never abort a fleet-wide operation.
// The `From<vpnfleet_api::Error>` impl folds wire-level failures into
// the two kinds callers care about: the server is unreachable, or it
// answered with something we could not read.

use thiserror::Error;

use crate::model::AddressFamily;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Address errors ───────────────────────────────────────────────
    #[error("Invalid address '{input}': {reason}")]
    InvalidAddress { input: String, reason: String },

    #[error("{operation} requires an {expected} block, got {block}")]
    FamilyMismatch {
        operation: String,
        expected: AddressFamily,
        block: String,
    },

    #[error("Cannot split {block}: {reason}")]
    RangeTooSmall { block: String, reason: String },

    #[error("Split count must be a non-zero power of two, got {count}")]
    InvalidSplitCount { count: u32 },

    // ── Topology errors ──────────────────────────────────────────────
    #[error("Range {block} is too small to host a tunnel-server instance")]
    InsufficientAddressSpace { block: String },

    // ── Fleet errors ─────────────────────────────────────────────────
    #[error("Management transport error: {message}")]
    TransportError { message: String },

    #[error("Cannot parse management reply: {message}")]
    ProtocolParseError { message: String },

    #[error("Server rejected command: {message}")]
    CommandRejected { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` if the server could not be reached or dropped the connection.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::TransportError { .. })
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<vpnfleet_api::Error> for CoreError {
    fn from(err: vpnfleet_api::Error) -> Self {
        use vpnfleet_api::Error as ApiError;

        match err {
            ApiError::Transport(_)
            | ApiError::Timeout { .. }
            | ApiError::Closed
            | ApiError::LineTooLong { .. } => CoreError::TransportError {
                message: err.to_string(),
            },
            ApiError::Protocol { message } => CoreError::ProtocolParseError { message },
            ApiError::CommandFailed { message } => CoreError::CommandRejected { message },
            ApiError::InvalidCommand { reason } => CoreError::Config { message: reason },
            ApiError::InvalidEndpoint { .. } => CoreError::Config {
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_timeout_is_a_transport_error() {
        let err = CoreError::from(vpnfleet_api::Error::Timeout { timeout_ms: 5000 });
        assert!(err.is_transport());
        assert!(err.to_string().contains("5000ms"));
    }

    #[test]
    fn api_protocol_error_keeps_its_message() {
        let err = CoreError::from(vpnfleet_api::Error::Protocol {
            message: "status reply has no 'ROUTING TABLE' section".into(),
        });
        assert!(
            matches!(err, CoreError::ProtocolParseError { ref message } if message.contains("ROUTING TABLE"))
        );
    }

    #[test]
    fn api_bad_endpoint_is_a_config_error() {
        let err = CoreError::from(vpnfleet_api::Error::InvalidEndpoint {
            input: "nowhere".into(),
        });
        assert!(matches!(err, CoreError::Config { ref message } if message.contains("'nowhere'")));
    }
}
