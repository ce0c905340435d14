// ── Offline generators ──
//
// Pure functions from planned pools to file contents. Writing the files
// is left to the caller.

pub mod firewall;
pub mod server_config;

pub use firewall::FirewallRules;
pub use server_config::ServerConfigs;

/// File name of the generated IPv4 rules.
pub const IPTABLES_FILE: &str = "iptables";
/// File name of the generated IPv6 rules.
pub const IP6TABLES_FILE: &str = "ip6tables";

/// File name for one instance configuration, `<poolId>-<index>.conf`.
pub fn server_config_file_name(key: &str) -> String {
    format!("{key}.conf")
}

/// Render a directive list as file contents, one directive per line.
pub fn render_lines(lines: &[String]) -> String {
    let mut text = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    text
}
