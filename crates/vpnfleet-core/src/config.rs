// ── Node runtime settings ──
//
// Host-level settings shared by every pool on this node. The config
// crate builds a `NodeSettings` from the TOML file and hands it in;
// core never reads files itself.

use std::path::PathBuf;
use std::time::Duration;

use vpnfleet_api::TransportConfig;

/// Settings that apply to every pool on the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSettings {
    /// Directory holding the connect/disconnect/OTP hook executables.
    pub hook_dir: PathBuf,
    /// Directory holding per-pool key material (`<tls_dir>/<poolId>/...`).
    pub tls_dir: PathBuf,
    /// Unprivileged account the tunnel servers drop to.
    pub user: String,
    pub group: String,
    /// Bound on each management connect and command.
    pub management_timeout: Duration,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            hook_dir: PathBuf::from("/usr/libexec/vpnfleet"),
            tls_dir: PathBuf::from("/etc/openvpn/tls"),
            user: "openvpn".into(),
            group: "openvpn".into(),
            management_timeout: Duration::from_secs(5),
        }
    }
}

impl NodeSettings {
    /// Transport tuning for management connections.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig::default().with_timeout(self.management_timeout)
    }
}
