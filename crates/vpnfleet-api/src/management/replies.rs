// Parsers for the short replies: `version`, `load-stats`, `kill`.

use serde::{Deserialize, Serialize};

use super::{ERROR_PREFIX, SUCCESS_PREFIX};
use crate::error::Error;

/// Reply to `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Full banner, e.g. `OpenVPN 2.6.12 x86_64-redhat-linux-gnu [SSL (OpenSSL)]`.
    pub openvpn: String,
    /// Management interface version, if reported.
    pub management: Option<u32>,
}

/// Reply to `load-stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoadStats {
    pub clients: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// `true` if the reply's final line carries the `SUCCESS: ` prefix.
pub fn is_success<L: AsRef<str>>(reply: &[L]) -> bool {
    reply
        .last()
        .is_some_and(|line| line.as_ref().starts_with(SUCCESS_PREFIX))
}

fn command_failure<L: AsRef<str>>(reply: &[L]) -> Option<Error> {
    reply.iter().find_map(|line| {
        line.as_ref()
            .strip_prefix(ERROR_PREFIX)
            .map(|msg| Error::CommandFailed {
                message: msg.to_owned(),
            })
    })
}

pub fn parse_version<L: AsRef<str>>(reply: &[L]) -> Result<VersionInfo, Error> {
    if let Some(err) = command_failure(reply) {
        return Err(err);
    }

    let mut openvpn = None;
    let mut management = None;
    for line in reply.iter().map(|l| l.as_ref()) {
        if let Some(banner) = line.strip_prefix("OpenVPN Version: ") {
            openvpn = Some(banner.trim().to_owned());
        } else if let Some(v) = line.strip_prefix("Management Version: ") {
            management = v.trim().parse().ok();
        }
    }

    openvpn
        .map(|openvpn| VersionInfo {
            openvpn,
            management,
        })
        .ok_or_else(|| Error::protocol("version reply has no 'OpenVPN Version' line"))
}

/// Parse `SUCCESS: nclients=1,bytesin=2,bytesout=3`.
pub fn parse_load_stats<L: AsRef<str>>(reply: &[L]) -> Result<LoadStats, Error> {
    if let Some(err) = command_failure(reply) {
        return Err(err);
    }

    let body = reply
        .iter()
        .find_map(|line| line.as_ref().strip_prefix(SUCCESS_PREFIX))
        .ok_or_else(|| Error::protocol("load-stats reply has no SUCCESS line"))?;

    let mut stats = LoadStats::default();
    for pair in body.split(',') {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(Error::protocol(format!("malformed load-stats field '{pair}'")));
        };
        let value: u64 = value
            .trim()
            .parse()
            .map_err(|_| Error::protocol(format!("non-numeric load-stats field '{pair}'")))?;
        match key.trim() {
            "nclients" => stats.clients = value,
            "bytesin" => stats.bytes_in = value,
            "bytesout" => stats.bytes_out = value,
            _ => {}
        }
    }
    Ok(stats)
}
