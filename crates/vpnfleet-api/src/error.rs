use thiserror::Error;

/// Top-level error type for the `vpnfleet-api` crate.
///
/// Covers every failure mode of a single management connection:
/// transport, framing, and reply interpretation. `vpnfleet-core`
/// maps these into per-server fleet outcomes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// Socket-level failure (connection refused, reset, EOF mid-reply).
    #[error("Management transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Connect or command exceeded the configured timeout.
    #[error("Management request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The connection was closed (explicitly or after a transport failure).
    #[error("Management connection is closed")]
    Closed,

    // ── Framing ─────────────────────────────────────────────────────
    /// A reply line exceeded the codec's maximum line length.
    #[error("Reply line exceeded {max} bytes")]
    LineTooLong { max: usize },

    /// The command text cannot be sent as a single protocol line.
    #[error("Invalid management command: {reason}")]
    InvalidCommand { reason: String },

    /// A management endpoint string is neither `host:port` nor a socket path.
    #[error("Invalid management endpoint '{input}'")]
    InvalidEndpoint { input: String },

    // ── Replies ─────────────────────────────────────────────────────
    /// The reply did not have the expected shape.
    #[error("Unexpected management reply: {message}")]
    Protocol { message: String },

    /// The server answered with an `ERROR: ` line.
    #[error("Management command failed: {message}")]
    CommandFailed { message: String },
}

impl Error {
    /// Returns `true` if the connection that produced this error is unusable.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout { .. } | Self::Closed | Self::LineTooLong { .. }
        )
    }

    /// Returns `true` if the reply could not be interpreted.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}
