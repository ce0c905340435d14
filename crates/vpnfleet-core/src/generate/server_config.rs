// ── OpenVPN server configuration ──
//
// One directive list per instance, sorted lexicographically so that
// regenerating an unchanged pool yields byte-identical files. Directive
// order carries no meaning for OpenVPN, so sorting is safe.

use std::net::IpAddr;

use indexmap::IndexMap;

use crate::config::NodeSettings;
use crate::error::CoreError;
use crate::model::{Instance, Pool, Proto};

/// Renegotiation interval when clients authenticate with a second factor.
const RENEG_SEC_TWO_FACTOR: u32 = 8 * 60 * 60;
/// Renegotiation interval otherwise.
const RENEG_SEC_DEFAULT: u32 = 60 * 60;

/// Directive lines for every instance of every pool, keyed `<poolId>-<index>`.
pub type ServerConfigs = IndexMap<String, Vec<String>>;

/// Generate the configuration of every instance in `pools`, in pool then
/// instance order.
pub fn generate(pools: &[Pool], node: &NodeSettings) -> Result<ServerConfigs, CoreError> {
    let mut configs = IndexMap::new();
    for pool in pools {
        for instance in &pool.instances {
            configs.insert(instance.key(pool.id()), instance_config(pool, instance, node)?);
        }
    }
    Ok(configs)
}

/// Sorted directive list for one instance.
pub fn instance_config(
    pool: &Pool,
    instance: &Instance,
    node: &NodeSettings,
) -> Result<Vec<String>, CoreError> {
    let mut lines = static_directives(pool, node);
    lines.extend(routing_directives(pool)?);
    lines.extend(policy_directives(pool, node));
    lines.extend(instance_directives(pool, instance)?);
    lines.sort();
    Ok(lines)
}

// ── Directive groups ────────────────────────────────────────────────

fn static_directives(pool: &Pool, node: &NodeSettings) -> Vec<String> {
    let tls = node.tls_dir.join(pool.id());
    let hooks = &node.hook_dir;

    let mut lines: Vec<String> = [
        "verb 3",
        "dev-type tun",
        "topology subnet",
        "persist-key",
        "persist-tun",
        "remote-cert-tls client",
        "dh none",
        "tls-version-min 1.2",
        "tls-cipher TLS-ECDHE-RSA-WITH-AES-256-GCM-SHA384",
        "ncp-ciphers AES-256-GCM",
        "cipher AES-256-GCM",
        "auth none",
        "keepalive 10 60",
        "script-security 2",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect();

    lines.extend([
        format!("user {}", node.user),
        format!("group {}", node.group),
        format!("ca {}", tls.join("ca.crt").display()),
        format!("cert {}", tls.join("server.crt").display()),
        format!("key {}", tls.join("server.key").display()),
        format!("tls-crypt {}", tls.join("tls-crypt.key").display()),
        format!("client-connect {}", hooks.join("client-connect").display()),
        format!("client-disconnect {}", hooks.join("client-disconnect").display()),
        format!("setenv PROFILE_ID {}", pool.id()),
    ]);
    lines
}

fn routing_directives(pool: &Pool) -> Result<Vec<String>, CoreError> {
    let spec = &pool.spec;
    let mut lines = Vec::new();

    if spec.default_gateway {
        lines.push(push("redirect-gateway def1 ipv6"));
        lines.push(push("route 0.0.0.0 0.0.0.0"));
        lines.push(push("route-ipv6 2000::/3"));
        for server in &spec.dns {
            lines.push(match server {
                IpAddr::V4(v4) => push(&format!("dhcp-option DNS {v4}")),
                IpAddr::V6(v6) => push(&format!("dhcp-option DNS6 {v6}")),
            });
        }
        lines.push(push("block-outside-dns"));
        if let Some(domain) = &spec.dns_domain {
            lines.push(push(&format!("dhcp-option DOMAIN {domain}")));
        }
    } else {
        for route in pool.routes_v4() {
            lines.push(push(&format!("route {} {}", route.network()?, route.netmask()?)));
        }
        for route in pool.routes_v6() {
            lines.push(push(&format!("route-ipv6 {}", route.truncated())));
        }
    }

    if spec.client_to_client {
        lines.push("client-to-client".to_owned());
        lines.push(push(&format!(
            "route {} {}",
            spec.range.network()?,
            spec.range.netmask()?
        )));
        lines.push(push(&format!("route-ipv6 {}", spec.range6.truncated())));
    }

    Ok(lines)
}

fn policy_directives(pool: &Pool, node: &NodeSettings) -> Vec<String> {
    let spec = &pool.spec;
    let mut lines = Vec::new();

    if spec.two_factor {
        lines.push(format!(
            "auth-user-pass-verify {} via-env",
            node.hook_dir.join("verify-otp").display()
        ));
        lines.push(format!("reneg-sec {RENEG_SEC_TWO_FACTOR}"));
    } else {
        lines.push(format!("reneg-sec {RENEG_SEC_DEFAULT}"));
    }

    if !spec.enable_log {
        lines.push("log /dev/null".to_owned());
    }

    lines
}

fn instance_directives(pool: &Pool, instance: &Instance) -> Result<Vec<String>, CoreError> {
    let listen = pool.spec.listen;
    let max_clients = instance.range.host_count().saturating_sub(1);

    let mut lines = vec![
        format!(
            "server {} {}",
            instance.range.network()?,
            instance.range.netmask()?
        ),
        format!("server-ipv6 {}", instance.range6.truncated()),
        format!("max-clients {max_clients}"),
        format!("dev {}", instance.dev_name),
        format!("port {}", instance.port),
        format!("proto {}", proto_directive(instance.proto, listen)),
        format!("local {listen}"),
        format!("management {} {}", pool.management_ip, instance.management_port),
    ];

    match instance.proto {
        Proto::Tcp => lines.push("tcp-nodelay".to_owned()),
        Proto::Udp => {
            lines.push("explicit-exit-notify 1".to_owned());
            if pool.spec.fix_mtu {
                for directive in ["tun-mtu 1500", "fragment 1300", "mssfix"] {
                    lines.push(directive.to_owned());
                    lines.push(push(directive));
                }
            }
        }
    }

    Ok(lines)
}

/// `udp`/`udp6` or `tcp-server`/`tcp6-server`, depending on the listen family.
fn proto_directive(proto: Proto, listen: IpAddr) -> &'static str {
    match (proto, listen.is_ipv6()) {
        (Proto::Udp, false) => "udp",
        (Proto::Udp, true) => "udp6",
        (Proto::Tcp, false) => "tcp-server",
        (Proto::Tcp, true) => "tcp6-server",
    }
}

fn push(option: &str) -> String {
    format!("push \"{option}\"")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::PoolSpec;
    use crate::topology::plan_pool;
    use pretty_assertions::assert_eq;

    fn pool_with(tweak: impl FnOnce(&mut PoolSpec)) -> Pool {
        let mut spec = PoolSpec::new(
            "internet",
            "10.42.42.0/24".parse().unwrap(),
            "fd00:4242:4242::/48".parse().unwrap(),
        );
        tweak(&mut spec);
        plan_pool(spec).unwrap()
    }

    fn has(lines: &[String], directive: &str) -> bool {
        lines.iter().any(|l| l == directive)
    }

    #[test]
    fn keys_follow_pool_and_instance() {
        let pool = pool_with(|_| {});
        let configs = generate(&[pool], &NodeSettings::default()).unwrap();
        let keys: Vec<&String> = configs.keys().collect();
        assert_eq!(keys, ["internet-0", "internet-1", "internet-2", "internet-3"]);
    }

    #[test]
    fn output_is_sorted() {
        let pool = pool_with(|s| s.default_gateway = true);
        let lines = instance_config(&pool, &pool.instances[0], &NodeSettings::default()).unwrap();
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
    }

    #[test]
    fn first_udp_instance_directives() {
        let pool = pool_with(|_| {});
        let lines = instance_config(&pool, &pool.instances[0], &NodeSettings::default()).unwrap();

        for expected in [
            "server 10.42.42.0 255.255.255.192",
            "server-ipv6 fd00:4242:4242::/64",
            "max-clients 61",
            "dev tun-internet-0",
            "port 1194",
            "proto udp6",
            "local ::",
            "management 127.42.0.1 11940",
            "explicit-exit-notify 1",
            "reneg-sec 3600",
            "log /dev/null",
            "user openvpn",
            "ca /etc/openvpn/tls/internet/ca.crt",
            "tls-crypt /etc/openvpn/tls/internet/tls-crypt.key",
            "client-connect /usr/libexec/vpnfleet/client-connect",
            "setenv PROFILE_ID internet",
        ] {
            assert!(has(&lines, expected), "missing '{expected}' in {lines:#?}");
        }
        assert!(!has(&lines, "tcp-nodelay"));
    }

    #[test]
    fn tcp_instance_on_ipv4_listen() {
        let pool = pool_with(|s| s.listen = "192.0.2.10".parse().unwrap());
        let lines = instance_config(&pool, &pool.instances[3], &NodeSettings::default()).unwrap();
        assert!(has(&lines, "proto tcp-server"));
        assert!(has(&lines, "port 1194"));
        assert!(has(&lines, "tcp-nodelay"));
        assert!(has(&lines, "local 192.0.2.10"));
        assert!(!has(&lines, "explicit-exit-notify 1"));
    }

    #[test]
    fn default_gateway_pushes_redirect_and_dns() {
        let pool = pool_with(|s| {
            s.default_gateway = true;
            s.dns = vec!["9.9.9.9".parse().unwrap(), "2620:fe::fe".parse().unwrap()];
            s.dns_domain = Some("vpn.example.org".into());
            s.routes = vec!["192.168.1.0/24".parse().unwrap()];
        });
        let lines = instance_config(&pool, &pool.instances[0], &NodeSettings::default()).unwrap();

        for expected in [
            r#"push "redirect-gateway def1 ipv6""#,
            r#"push "route 0.0.0.0 0.0.0.0""#,
            r#"push "route-ipv6 2000::/3""#,
            r#"push "dhcp-option DNS 9.9.9.9""#,
            r#"push "dhcp-option DNS6 2620:fe::fe""#,
            r#"push "block-outside-dns""#,
            r#"push "dhcp-option DOMAIN vpn.example.org""#,
        ] {
            assert!(has(&lines, expected), "missing '{expected}'");
        }
        assert!(!has(&lines, r#"push "route 192.168.1.0 255.255.255.0""#));
    }

    #[test]
    fn explicit_routes_without_default_gateway() {
        let pool = pool_with(|s| {
            s.routes = vec![
                "192.168.1.0/24".parse().unwrap(),
                "fd00:1::/64".parse().unwrap(),
            ];
            s.dns = vec!["9.9.9.9".parse().unwrap()];
        });
        let lines = instance_config(&pool, &pool.instances[0], &NodeSettings::default()).unwrap();
        let pushes: Vec<&String> = lines.iter().filter(|l| l.starts_with("push")).collect();
        assert_eq!(
            pushes,
            [
                r#"push "route 192.168.1.0 255.255.255.0""#,
                r#"push "route-ipv6 fd00:1::/64""#,
            ]
        );
    }

    #[test]
    fn client_to_client_pushes_pool_ranges() {
        let pool = pool_with(|s| s.client_to_client = true);
        let lines = instance_config(&pool, &pool.instances[1], &NodeSettings::default()).unwrap();
        assert!(has(&lines, "client-to-client"));
        assert!(has(&lines, r#"push "route 10.42.42.0 255.255.255.0""#));
        assert!(has(&lines, r#"push "route-ipv6 fd00:4242:4242::/48""#));
    }

    #[test]
    fn two_factor_and_logging() {
        let pool = pool_with(|s| {
            s.two_factor = true;
            s.enable_log = true;
        });
        let lines = instance_config(&pool, &pool.instances[0], &NodeSettings::default()).unwrap();
        assert!(has(
            &lines,
            "auth-user-pass-verify /usr/libexec/vpnfleet/verify-otp via-env"
        ));
        assert!(has(&lines, "reneg-sec 28800"));
        assert!(!has(&lines, "reneg-sec 3600"));
        assert!(!has(&lines, "log /dev/null"));
    }

    #[test]
    fn mtu_fix_only_on_udp() {
        let pool = pool_with(|s| s.fix_mtu = true);
        let node = NodeSettings::default();

        let udp = instance_config(&pool, &pool.instances[0], &node).unwrap();
        for expected in [
            "tun-mtu 1500",
            "fragment 1300",
            "mssfix",
            r#"push "tun-mtu 1500""#,
            r#"push "fragment 1300""#,
            r#"push "mssfix""#,
        ] {
            assert!(has(&udp, expected), "missing '{expected}'");
        }

        let tcp = instance_config(&pool, &pool.instances[3], &node).unwrap();
        assert!(!has(&tcp, "mssfix"));
    }
}
