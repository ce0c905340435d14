//! Parser for the reply to the `status` command (version 1 format).
//!
//! ```text
//! OpenVPN CLIENT LIST
//! Updated,Mon Oct 19 09:15:02 2026
//! Common Name,Real Address,Bytes Received,Bytes Sent,Connected Since
//! alice,198.51.100.7:50312,4096,8192,Mon Oct 19 09:15:02 2026
//! ROUTING TABLE
//! Virtual Address,Common Name,Real Address,Last Ref
//! 10.42.42.2,alice,198.51.100.7:50312,Mon Oct 19 09:15:10 2026
//! GLOBAL STATS
//! Max bcast/mcast queue length,0
//! END
//! ```
//!
//! Sections are located by their marker lines rather than by fixed line
//! offsets. The title, `Updated` and column header rows are only skipped
//! before the first client row; every later line is a client, whatever
//! its common name.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::END_MARKER;
use crate::error::Error;

const CLIENT_LIST_TITLE: &str = "OpenVPN CLIENT LIST";
const UPDATED_PREFIX: &str = "Updated,";
const CLIENT_HEADER_PREFIX: &str = "Common Name,";
const ROUTING_TABLE_MARKER: &str = "ROUTING TABLE";
const ROUTING_HEADER_PREFIX: &str = "Virtual Address,";
const GLOBAL_STATS_MARKER: &str = "GLOBAL STATS";

/// Timestamp layout used by the client list, e.g. `Thu Oct  1 08:00:00 2026`.
const CONNECTED_SINCE_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// One connected session, merged from the client list and routing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub common_name: String,
    pub real_address: String,
    pub bytes_in: u64,
    pub bytes_out: u64,
    /// Unix time (seconds) the session was established.
    pub connected_since: i64,
    /// Tunnel addresses routed to this session, in routing-table order.
    pub virtual_addresses: Vec<String>,
}

/// Parse a complete `status` reply into session records.
///
/// Routing-table rows naming a client absent from the client list are
/// dropped (the session most likely vanished between the two sections).
pub fn parse_status<L: AsRef<str>>(reply: &[L]) -> Result<Vec<SessionRecord>, Error> {
    let lines: Vec<&str> = reply.iter().map(|l| l.as_ref().trim_end()).collect();

    let routing_at = find_marker(&lines, 0, ROUTING_TABLE_MARKER)?;
    let stats_at = find_marker(&lines, routing_at + 1, GLOBAL_STATS_MARKER)?;

    let mut records = Vec::new();
    let mut in_rows = false;
    for line in lines.iter().take(routing_at) {
        if line.is_empty() {
            continue;
        }
        if !in_rows {
            if line.starts_with(CLIENT_HEADER_PREFIX) {
                in_rows = true;
                continue;
            }
            if is_client_preamble(line) {
                continue;
            }
            in_rows = true;
        }
        records.push(parse_client_row(line)?);
    }

    for line in lines.iter().take(stats_at).skip(routing_at + 1) {
        if line.is_empty() || line.starts_with(ROUTING_HEADER_PREFIX) {
            continue;
        }
        let (virtual_address, common_name, real_address) = parse_route_row(line)?;
        let owner = records.iter_mut().find(|r| {
            r.common_name == common_name && real_address.is_none_or(|ra| r.real_address == ra)
        });
        match owner {
            Some(record) => record.virtual_addresses.push(virtual_address.to_owned()),
            None => warn!(
                common_name,
                virtual_address, "routing table entry has no matching client, dropping"
            ),
        }
    }

    Ok(records)
}

/// Find `marker` at or after `from`, failing if `END` comes first.
fn find_marker(lines: &[&str], from: usize, marker: &str) -> Result<usize, Error> {
    for (idx, line) in lines.iter().enumerate().skip(from) {
        if line.starts_with(marker) {
            return Ok(idx);
        }
        if line.starts_with(END_MARKER) {
            break;
        }
    }
    Err(Error::protocol(format!("status reply has no '{marker}' section")))
}

fn is_client_preamble(line: &str) -> bool {
    line.starts_with(CLIENT_LIST_TITLE) || line.starts_with(UPDATED_PREFIX)
}

fn parse_client_row(line: &str) -> Result<SessionRecord, Error> {
    let fields: Vec<&str> = line.split(',').collect();
    let [common_name, real_address, bytes_in, bytes_out, since, ..] = fields.as_slice() else {
        return Err(Error::protocol(format!("short client list row: '{line}'")));
    };

    Ok(SessionRecord {
        common_name: (*common_name).to_owned(),
        real_address: (*real_address).to_owned(),
        bytes_in: parse_counter(bytes_in, line)?,
        bytes_out: parse_counter(bytes_out, line)?,
        connected_since: parse_connected_since(since)?,
        virtual_addresses: Vec::new(),
    })
}

/// Returns `(virtual address, common name, real address if present)`.
fn parse_route_row(line: &str) -> Result<(&str, &str, Option<&str>), Error> {
    let mut fields = line.split(',');
    match (fields.next(), fields.next()) {
        (Some(virt), Some(cn)) if !virt.is_empty() => Ok((virt, cn, fields.next())),
        _ => Err(Error::protocol(format!("short routing table row: '{line}'"))),
    }
}

fn parse_counter(value: &str, line: &str) -> Result<u64, Error> {
    value
        .parse()
        .map_err(|_| Error::protocol(format!("non-numeric byte counter '{value}' in '{line}'")))
}

/// Interpret the client-list timestamp as UTC and return unix seconds.
pub fn parse_connected_since(text: &str) -> Result<i64, Error> {
    NaiveDateTime::parse_from_str(text.trim(), CONNECTED_SINCE_FORMAT)
        .map(|dt| dt.and_utc().timestamp())
        .map_err(|e| Error::protocol(format!("bad connected-since '{text}': {e}")))
}
