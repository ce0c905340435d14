// ── Fleet types ──
//
// Per-server results of fleet-wide operations. A server that cannot be
// reached or answers garbage is reported, never propagated as an error.

use serde::{Deserialize, Serialize};
use strum::Display;
use vpnfleet_api::ManagementEndpoint;

/// One live-managed tunnel server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetEntry {
    pub id: String,
    pub display_name: String,
    pub endpoint: ManagementEndpoint,
}

/// Why a server could not contribute to a fleet-wide operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UnavailableKind {
    /// Connection refused, reset or closed mid-reply.
    Transport,
    /// No complete answer within the configured timeout.
    Timeout,
    /// The reply could not be parsed.
    Protocol,
    /// The server answered with an `ERROR: ` line.
    Rejected,
    /// The request never left: bad endpoint or command text.
    Invalid,
}

impl From<&vpnfleet_api::Error> for UnavailableKind {
    fn from(err: &vpnfleet_api::Error) -> Self {
        use vpnfleet_api::Error as ApiError;

        match err {
            ApiError::Timeout { .. } => Self::Timeout,
            ApiError::Transport(_) | ApiError::Closed | ApiError::LineTooLong { .. } => {
                Self::Transport
            }
            ApiError::Protocol { .. } => Self::Protocol,
            ApiError::CommandFailed { .. } => Self::Rejected,
            ApiError::InvalidCommand { .. } | ApiError::InvalidEndpoint { .. } => Self::Invalid,
        }
    }
}

/// What one server contributed to a fleet-wide operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ServerOutcome<T> {
    Available { value: T },
    Unavailable { kind: UnavailableKind, reason: String },
}

/// A [`ServerOutcome`] labelled with the server it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerReply<T> {
    pub server_id: String,
    pub display_name: String,
    #[serde(flatten)]
    pub outcome: ServerOutcome<T>,
}

impl<T> ServerReply<T> {
    pub fn is_available(&self) -> bool {
        matches!(self.outcome, ServerOutcome::Available { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match &self.outcome {
            ServerOutcome::Available { value } => Some(value),
            ServerOutcome::Unavailable { .. } => None,
        }
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.outcome {
            ServerOutcome::Available { .. } => None,
            ServerOutcome::Unavailable { reason, .. } => Some(reason),
        }
    }

    pub fn unavailable_kind(&self) -> Option<UnavailableKind> {
        match &self.outcome {
            ServerOutcome::Available { .. } => None,
            ServerOutcome::Unavailable { kind, .. } => Some(*kind),
        }
    }
}
