// OpenVPN management interface: connection state machine, reply
// framing, and parsers for the multi-line replies the fleet uses.

pub mod client;
pub mod replies;
pub mod status;

/// Prefix of a successful single-line reply.
pub const SUCCESS_PREFIX: &str = "SUCCESS: ";
/// Prefix of a failed single-line reply.
pub const ERROR_PREFIX: &str = "ERROR: ";
/// Final line of a multi-line reply.
pub const END_MARKER: &str = "END";

/// Returns `true` if `line` ends a command reply.
pub fn is_terminator(line: &str) -> bool {
    line.starts_with(END_MARKER) || line.starts_with(SUCCESS_PREFIX) || line.starts_with(ERROR_PREFIX)
}

/// Returns `true` if `line` is an asynchronous real-time notification.
pub fn is_notification(line: &str) -> bool {
    line.starts_with('>')
}
