//! Fleet command handlers: `status`, `version`, `load-stats`, `kill`.
//!
//! Every handler talks to all servers at once and renders one row per
//! server (per session for `status`). Unreachable servers are shown, not
//! fatal; the command only fails when no server answered at all.

use std::fmt::Write as _;

use chrono::DateTime;
use tabled::Tabled;

use vpnfleet_core::{
    FleetController, LoadStats, ServerReply, SessionRecord, UnavailableKind, VersionInfo,
};

use crate::cli::{GlobalOpts, KillArgs};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Controller setup ────────────────────────────────────────────────

fn controller(cfg: &Config, global: &GlobalOpts) -> Result<(FleetController, u64), CliError> {
    let pools = cfg.pools()?;
    let entries = cfg.fleet_entries(&pools)?;
    if entries.is_empty() {
        return Err(CliError::NothingConfigured {
            what: "servers".into(),
            path: config::resolved_path(global).display().to_string(),
        });
    }
    let node = config::node_settings(cfg, global)?;
    tracing::debug!(servers = entries.len(), "built fleet");
    Ok((
        FleetController::new(entries, node.transport()),
        node.management_timeout.as_secs(),
    ))
}

/// Fail when every server was unavailable.
fn check_reachable<T>(replies: &[ServerReply<T>], timeout_secs: u64) -> Result<(), CliError> {
    if replies.is_empty() || replies.iter().any(ServerReply::is_available) {
        return Ok(());
    }
    if replies
        .iter()
        .all(|r| r.unavailable_kind() == Some(UnavailableKind::Timeout))
    {
        return Err(CliError::Timeout {
            seconds: timeout_secs,
        });
    }
    Err(CliError::Unreachable {
        message: format!("all {} servers are unavailable", replies.len()),
    })
}

fn state_cell<T>(reply: &ServerReply<T>, color: bool) -> String {
    output::availability(reply.is_available(), color)
}

fn reason_cell<T>(reply: &ServerReply<T>, color: bool) -> String {
    reply
        .unavailable_reason()
        .map(|r| output::muted(r, color))
        .unwrap_or_default()
}

fn format_since(unix: i64) -> String {
    DateTime::from_timestamp(unix, 0)
        .map_or_else(|| unix.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

// ── status ──────────────────────────────────────────────────────────

#[derive(Tabled)]
struct SessionRow {
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Common Name")]
    common_name: String,
    #[tabled(rename = "Real Address")]
    real_address: String,
    #[tabled(rename = "Virtual Addresses")]
    virtual_addresses: String,
    #[tabled(rename = "Received")]
    bytes_in: String,
    #[tabled(rename = "Sent")]
    bytes_out: String,
    #[tabled(rename = "Connected Since")]
    connected_since: String,
}

fn session_row(server: &str, s: &SessionRecord) -> SessionRow {
    SessionRow {
        server: server.to_owned(),
        common_name: s.common_name.clone(),
        real_address: s.real_address.clone(),
        virtual_addresses: s.virtual_addresses.join(", "),
        bytes_in: util::format_bytes(s.bytes_in),
        bytes_out: util::format_bytes(s.bytes_out),
        connected_since: format_since(s.connected_since),
    }
}

fn status_table(replies: &[ServerReply<Vec<SessionRecord>>], color: bool) -> String {
    let rows: Vec<SessionRow> = replies
        .iter()
        .filter_map(|r| r.value().map(|sessions| (r.server_id.as_str(), sessions)))
        .flat_map(|(server, sessions)| sessions.iter().map(move |s| session_row(server, s)))
        .collect();

    let mut out = if rows.is_empty() {
        "No connected sessions.".to_owned()
    } else {
        tabled::Table::new(rows)
            .with(tabled::settings::Style::rounded())
            .to_string()
    };
    for reply in replies {
        if let Some(reason) = reply.unavailable_reason() {
            let _ = write!(
                out,
                "\n{} {} ({}): {}",
                output::availability(false, color),
                reply.server_id,
                reply.display_name,
                output::muted(reason, color),
            );
        }
    }
    out
}

pub async fn status(cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let (fleet, timeout) = controller(cfg, global)?;
    let replies = fleet.status().await;
    fleet.close_all().await;

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &replies,
        |r| status_table(r, color),
        |r| {
            r.iter()
                .filter_map(|reply| reply.value().map(|v| (reply, v)))
                .flat_map(|(reply, sessions)| {
                    sessions
                        .iter()
                        .map(move |s| format!("{}\t{}", reply.server_id, s.common_name))
                })
                .collect::<Vec<_>>()
                .join("\n")
        },
    )?;
    output::print_output(&out, global.quiet);
    check_reachable(&replies, timeout)
}

// ── version ─────────────────────────────────────────────────────────

#[derive(Tabled)]
struct VersionRow {
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "OpenVPN")]
    openvpn: String,
    #[tabled(rename = "Management")]
    management: String,
}

pub async fn version(cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let (fleet, timeout) = controller(cfg, global)?;
    let replies = fleet.version().await;
    fleet.close_all().await;

    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &replies,
        |r: &ServerReply<VersionInfo>| VersionRow {
            server: r.server_id.clone(),
            name: r.display_name.clone(),
            state: state_cell(r, color),
            openvpn: r
                .value()
                .map_or_else(|| reason_cell(r, color), |v| v.openvpn.clone()),
            management: r
                .value()
                .and_then(|v| v.management)
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        },
        |r| {
            let banner = r.value().map(|v| v.openvpn.as_str()).unwrap_or_default();
            format!("{}\t{banner}", r.server_id)
        },
    )?;
    output::print_output(&out, global.quiet);
    check_reachable(&replies, timeout)
}

// ── load-stats ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct LoadRow {
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Clients")]
    clients: String,
    #[tabled(rename = "Received")]
    bytes_in: String,
    #[tabled(rename = "Sent")]
    bytes_out: String,
}

fn load_row(r: &ServerReply<LoadStats>, color: bool) -> LoadRow {
    let (clients, bytes_in, bytes_out) = match r.value() {
        Some(s) => (
            s.clients.to_string(),
            util::format_bytes(s.bytes_in),
            util::format_bytes(s.bytes_out),
        ),
        None => (reason_cell(r, color), String::new(), String::new()),
    };
    LoadRow {
        server: r.server_id.clone(),
        name: r.display_name.clone(),
        state: state_cell(r, color),
        clients,
        bytes_in,
        bytes_out,
    }
}

pub async fn load_stats(cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let (fleet, timeout) = controller(cfg, global)?;
    let replies = fleet.load_stats().await;
    fleet.close_all().await;

    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &replies,
        |r| load_row(r, color),
        |r| {
            let clients = r.value().map(|s| s.clients.to_string()).unwrap_or_default();
            format!("{}\t{clients}", r.server_id)
        },
    )?;
    output::print_output(&out, global.quiet);
    check_reachable(&replies, timeout)
}

// ── kill ────────────────────────────────────────────────────────────

#[derive(Tabled)]
struct KillRow {
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Result")]
    result: String,
}

fn kill_result(r: &ServerReply<bool>, color: bool) -> String {
    match r.value() {
        Some(true) => "killed".into(),
        Some(false) => output::muted("not connected", color),
        None => reason_cell(r, color),
    }
}

fn validate_common_name(common_name: &str) -> Result<(), CliError> {
    if common_name.is_empty()
        || common_name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(CliError::Validation {
            field: "common-name".into(),
            reason: "must be non-empty and contain no whitespace".into(),
        });
    }
    Ok(())
}

pub async fn kill(cfg: &Config, args: &KillArgs, global: &GlobalOpts) -> Result<(), CliError> {
    validate_common_name(&args.common_name)?;
    let (fleet, timeout) = controller(cfg, global)?;

    let prompt = format!(
        "Disconnect '{}' from all {} servers?",
        args.common_name,
        fleet.len()
    );
    if !util::confirm(&prompt, global.yes)? {
        return Ok(());
    }

    let replies = fleet.kill(&args.common_name).await;
    fleet.close_all().await;

    let killed = replies.iter().filter(|r| r.value() == Some(&true)).count();
    tracing::info!(common_name = %args.common_name, killed, "kill finished");
    if killed == 0 {
        tracing::warn!(common_name = %args.common_name, "no server had a matching session");
    }

    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &replies,
        |r| KillRow {
            server: r.server_id.clone(),
            name: r.display_name.clone(),
            state: state_cell(r, color),
            result: kill_result(r, color),
        },
        |r| format!("{}\t{}", r.server_id, kill_result(r, false)),
    )?;
    output::print_output(&out, global.quiet);
    check_reachable(&replies, timeout)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use vpnfleet_core::ServerOutcome;

    fn reply<T>(id: &str, outcome: ServerOutcome<T>) -> ServerReply<T> {
        ServerReply {
            server_id: id.into(),
            display_name: format!("Server {id}"),
            outcome,
        }
    }

    fn down<T>(id: &str, kind: UnavailableKind, reason: &str) -> ServerReply<T> {
        reply(
            id,
            ServerOutcome::Unavailable {
                kind,
                reason: reason.into(),
            },
        )
    }

    #[test]
    fn partial_outage_is_not_an_error() {
        let replies = vec![
            reply("a", ServerOutcome::Available { value: true }),
            down("b", UnavailableKind::Transport, "Management transport error: refused"),
        ];
        assert!(check_reachable(&replies, 5).is_ok());
    }

    #[test]
    fn total_outage_maps_to_exit_codes() {
        let refused: Vec<ServerReply<bool>> = vec![
            down("a", UnavailableKind::Transport, "refused"),
            down("b", UnavailableKind::Timeout, "timed out"),
        ];
        assert!(matches!(
            check_reachable(&refused, 5),
            Err(CliError::Unreachable { .. })
        ));

        let slow: Vec<ServerReply<bool>> = vec![
            down("a", UnavailableKind::Timeout, "no answer"),
            down("b", UnavailableKind::Timeout, "no answer"),
        ];
        assert!(matches!(
            check_reachable(&slow, 5),
            Err(CliError::Timeout { seconds: 5 })
        ));

        // The kind decides, not the wording of the reason.
        let garbled: Vec<ServerReply<bool>> =
            vec![down("a", UnavailableKind::Protocol, "field timed out is not a number")];
        assert!(matches!(
            check_reachable(&garbled, 5),
            Err(CliError::Unreachable { .. })
        ));
    }

    #[test]
    fn empty_fleet_reply_list_is_fine() {
        let none: Vec<ServerReply<bool>> = Vec::new();
        assert!(check_reachable(&none, 5).is_ok());
    }

    #[test]
    fn status_table_lists_sessions_and_outages() {
        let session = SessionRecord {
            common_name: "alice".into(),
            real_address: "198.51.100.7:50312".into(),
            bytes_in: 2048,
            bytes_out: 100,
            connected_since: 0,
            virtual_addresses: vec!["10.42.42.2".into(), "fd00:4242:4242::1000".into()],
        };
        let replies = vec![
            reply(
                "internet-0",
                ServerOutcome::Available {
                    value: vec![session],
                },
            ),
            down("internet-1", UnavailableKind::Transport, "refused"),
        ];

        let table = status_table(&replies, false);
        assert!(table.contains("alice"));
        assert!(table.contains("10.42.42.2, fd00:4242:4242::1000"));
        assert!(table.contains("2.0 KiB"));
        assert!(table.contains("1970-01-01 00:00:00"));
        assert!(table.contains("down internet-1 (Server internet-1): refused"));
    }

    #[test]
    fn kill_results_read_naturally() {
        let hit = reply("a", ServerOutcome::Available { value: true });
        let miss = reply("b", ServerOutcome::Available { value: false });
        assert_eq!(kill_result(&hit, false), "killed");
        assert_eq!(kill_result(&miss, false), "not connected");
        assert_eq!(kill_result(&down::<bool>("c", UnavailableKind::Transport, "refused"), false), "refused");
    }

    #[test]
    fn common_name_must_be_printable() {
        assert!(validate_common_name("alice").is_ok());
        assert!(validate_common_name("").is_err());
        assert!(validate_common_name("alice\nstatus").is_err());
        assert!(validate_common_name("alice smith").is_err());
    }
}
