// ── Packet-filter rules ──
//
// Renders `iptables-restore` / `ip6tables-restore` input for all pools.
// Each pool gets its own `vpn-<poolId>` chain; FORWARD only dispatches
// into those chains and rejects whatever they did not accept.

use std::collections::BTreeSet;

use serde::Serialize;

use super::render_lines;
use crate::model::{AddressBlock, AddressFamily, Pool, Proto};
use crate::topology::MANAGEMENT_BASE_PORT;

/// Ports for web/ssh administration of the node itself.
const ADMIN_TCP_PORTS: &str = "22,80,443";
/// NetBIOS and SMB.
const SMB_PORTS: &str = "137:139,445";

/// Rule files for both address families.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirewallRules {
    /// Input for `iptables-restore`.
    pub v4: String,
    /// Input for `ip6tables-restore`.
    pub v6: String,
}

/// Generate rule sets for every pool.
pub fn generate(pools: &[Pool]) -> FirewallRules {
    FirewallRules {
        v4: render_lines(&ruleset(pools, AddressFamily::V4)),
        v6: render_lines(&ruleset(pools, AddressFamily::V6)),
    }
}

/// Rule lines for one family, NAT table first.
pub fn ruleset(pools: &[Pool], family: AddressFamily) -> Vec<String> {
    let included: Vec<&Pool> = pools
        .iter()
        .filter(|p| family == AddressFamily::V4 || p.spec.forward6)
        .collect();

    let mut lines = nat_table(&included, family);
    lines.extend(filter_table(pools, &included, family));
    lines
}

// ── nat ─────────────────────────────────────────────────────────────

fn nat_table(pools: &[&Pool], family: AddressFamily) -> Vec<String> {
    let mut lines = vec![
        "*nat".to_owned(),
        ":PREROUTING ACCEPT [0:0]".to_owned(),
        ":INPUT ACCEPT [0:0]".to_owned(),
        ":OUTPUT ACCEPT [0:0]".to_owned(),
        ":POSTROUTING ACCEPT [0:0]".to_owned(),
    ];
    for pool in pools.iter().filter(|p| p.spec.use_nat) {
        lines.push(format!(
            "-A POSTROUTING -s {} -o {} -j MASQUERADE",
            pool_range(pool, family),
            pool.spec.ext_if
        ));
    }
    lines.push("COMMIT".to_owned());
    lines
}

// ── filter ──────────────────────────────────────────────────────────

fn filter_table(all: &[Pool], included: &[&Pool], family: AddressFamily) -> Vec<String> {
    let mut lines = vec![
        "*filter".to_owned(),
        ":INPUT ACCEPT [0:0]".to_owned(),
        ":FORWARD ACCEPT [0:0]".to_owned(),
        ":OUTPUT ACCEPT [0:0]".to_owned(),
    ];
    lines.extend(included.iter().map(|p| format!(":{} - [0:0]", chain_name(p))));
    lines.extend(input_rules(all, family));
    lines.extend(forward_rules(included, family));
    lines.push("COMMIT".to_owned());
    lines
}

fn input_rules(pools: &[Pool], family: AddressFamily) -> Vec<String> {
    let icmp = match family {
        AddressFamily::V4 => "icmp",
        AddressFamily::V6 => "ipv6-icmp",
    };

    let mut lines = vec![
        "-A INPUT -m state --state ESTABLISHED,RELATED -j ACCEPT".to_owned(),
        format!("-A INPUT -p {icmp} -j ACCEPT"),
        "-A INPUT -i lo -j ACCEPT".to_owned(),
        format!(
            "-A INPUT -m state --state NEW -m multiport -p tcp --dports {ADMIN_TCP_PORTS} -j ACCEPT"
        ),
    ];

    let max = crate::topology::max_instances(pools);
    if max > 0 {
        let last = usize::from(MANAGEMENT_BASE_PORT) + max - 1;
        lines.push(format!(
            "-A INPUT -m state --state NEW -m tcp -p tcp --dport {MANAGEMENT_BASE_PORT}:{last} -j ACCEPT"
        ));
    }

    let listeners: BTreeSet<(Proto, u16)> = pools
        .iter()
        .flat_map(|p| p.instances.iter().map(|i| (i.proto, i.port)))
        .collect();
    for (proto, port) in listeners {
        lines.push(format!(
            "-A INPUT -m state --state NEW -m {proto} -p {proto} --dport {port} -j ACCEPT"
        ));
    }

    lines.push(format!("-A INPUT -j REJECT --reject-with {}", prohibited(family)));
    lines
}

fn forward_rules(pools: &[&Pool], family: AddressFamily) -> Vec<String> {
    let reject = prohibited(family);
    let mut lines = vec!["-A FORWARD -m state --state ESTABLISHED,RELATED -j ACCEPT".to_owned()];

    for pool in pools {
        let chain = chain_name(pool);
        let range = pool_range(pool, family);
        let tun = format!("tun-{}+", pool.id());
        let ext_if = &pool.spec.ext_if;

        lines.push(format!("-A FORWARD -i {tun} -s {range} -j {chain}"));

        if pool.spec.block_smb {
            for proto in [Proto::Tcp, Proto::Udp] {
                lines.push(format!(
                    "-A {chain} -p {proto} -m multiport --dports {SMB_PORTS} -j REJECT --reject-with {reject}"
                ));
            }
        }

        if pool.spec.client_to_client {
            lines.push(format!("-A {chain} -o {tun} -d {range} -j ACCEPT"));
        }

        if pool.spec.default_gateway {
            lines.push(format!("-A {chain} -o {ext_if} -j ACCEPT"));
        } else {
            let routes = pool.spec.routes.iter().filter(|r| r.family() == family);
            for route in routes {
                lines.push(format!(
                    "-A {chain} -o {ext_if} -d {} -j ACCEPT",
                    route.truncated()
                ));
            }
        }
    }

    lines.push(format!("-A FORWARD -j REJECT --reject-with {reject}"));
    lines
}

// ── Helpers ─────────────────────────────────────────────────────────

fn chain_name(pool: &Pool) -> String {
    format!("vpn-{}", pool.id())
}

fn pool_range(pool: &Pool, family: AddressFamily) -> AddressBlock {
    match family {
        AddressFamily::V4 => pool.spec.range.truncated(),
        AddressFamily::V6 => pool.spec.range6.truncated(),
    }
}

fn prohibited(family: AddressFamily) -> &'static str {
    match family {
        AddressFamily::V4 => "icmp-host-prohibited",
        AddressFamily::V6 => "icmp6-adm-prohibited",
    }
}
