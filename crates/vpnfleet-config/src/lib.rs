//! Configuration for the vpnfleet node.
//!
//! TOML file model, layered loading (defaults, file, `VPNFLEET_` env),
//! validation, and translation into `vpnfleet_core` types. Core never
//! reads files; everything it needs is built here.

use std::collections::{BTreeMap, HashSet};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use vpnfleet_api::ManagementEndpoint;
use vpnfleet_core::acl::{self, GroupProvider, GroupProviderKind};
use vpnfleet_core::fleet::entries_for_pools;
use vpnfleet_core::{AddressBlock, AddressFamily, CoreError, FleetEntry, NodeSettings, Pool, PoolSpec};

/// Linux interface names are at most 15 bytes.
const MAX_IFNAME_LEN: usize = 15;
/// Pool indices map onto one octet of the management address.
const MAX_POOLS: usize = 256;
/// Largest instance index any pool can have.
const MAX_INSTANCE_INDEX: usize = 7;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,

    /// Group memberships for the `static` group provider.
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,

    /// Pools in declaration order; the position is the pool index.
    #[serde(default)]
    pub pools: Vec<PoolConfig>,

    /// Extra management endpoints managed alongside the pool instances.
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

/// `[node]`: host-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
    #[serde(default = "default_management_timeout")]
    pub management_timeout_secs: u64,

    #[serde(default = "default_hook_dir")]
    pub hook_dir: PathBuf,

    #[serde(default = "default_tls_dir")]
    pub tls_dir: PathBuf,

    #[serde(default = "default_account")]
    pub user: String,

    #[serde(default = "default_account")]
    pub group: String,

    #[serde(default)]
    pub group_provider: GroupProviderKind,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            management_timeout_secs: default_management_timeout(),
            hook_dir: default_hook_dir(),
            tls_dir: default_tls_dir(),
            user: default_account(),
            group: default_account(),
            group_provider: GroupProviderKind::default(),
        }
    }
}

fn default_management_timeout() -> u64 {
    5
}
fn default_hook_dir() -> PathBuf {
    PathBuf::from("/usr/libexec/vpnfleet")
}
fn default_tls_dir() -> PathBuf {
    PathBuf::from("/etc/openvpn/tls")
}
fn default_account() -> String {
    "openvpn".into()
}

/// `[[pools]]`: one tenant profile.
///
/// Addresses stay strings here so validation can report which field of
/// which pool is wrong.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    pub id: String,
    pub display_name: String,
    pub host_name: String,
    #[serde(default = "default_ext_if")]
    pub ext_if: String,
    pub range: String,
    pub range6: String,
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub routes: Vec<String>,
    #[serde(default)]
    pub dns: Vec<String>,
    pub dns_domain: Option<String>,
    #[serde(default)]
    pub use_nat: bool,
    #[serde(default)]
    pub default_gateway: bool,
    #[serde(default)]
    pub client_to_client: bool,
    #[serde(default)]
    pub two_factor: bool,
    #[serde(default)]
    pub enable_log: bool,
    #[serde(default)]
    pub enable_acl: bool,
    #[serde(default)]
    pub acl_group_list: Vec<String>,
    #[serde(default)]
    pub block_smb: bool,
    #[serde(default = "default_true")]
    pub forward6: bool,
    #[serde(default)]
    pub fix_mtu: bool,
    #[serde(default)]
    pub hide_profile: bool,
}

fn default_ext_if() -> String {
    "eth0".into()
}
fn default_listen() -> String {
    "::".into()
}
fn default_true() -> bool {
    true
}

/// `[[servers]]`: a management endpoint outside any pool.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub id: String,
    pub display_name: String,
    pub endpoint: String,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "vpnfleet", "vpnfleet").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("vpnfleet");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from `path`, layered over defaults and under `VPNFLEET_*`
/// environment overrides (`VPNFLEET_NODE__USER=nobody`).
///
/// A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading configuration");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("VPNFLEET_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load from the canonical path.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

// ── Validation and translation ──────────────────────────────────────

impl Config {
    /// Serialize back to TOML (used by `config show`).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check the whole file without building anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pools = self.pool_specs()?;
        let planned = vpnfleet_core::plan_pools(pools)?;
        self.fleet_entries(&planned)?;
        Ok(())
    }

    pub fn node_settings(&self) -> NodeSettings {
        NodeSettings {
            hook_dir: self.node.hook_dir.clone(),
            tls_dir: self.node.tls_dir.clone(),
            user: self.node.user.clone(),
            group: self.node.group.clone(),
            management_timeout: Duration::from_secs(self.node.management_timeout_secs),
        }
    }

    /// The group provider selected by `node.group_provider`.
    pub fn group_provider(&self) -> Box<dyn GroupProvider> {
        let members = self
            .groups
            .iter()
            .map(|(user, groups)| (user.clone(), groups.clone()))
            .collect();
        acl::group_provider(self.node.group_provider, members)
    }

    /// Validated pool specs, `pool_index` assigned in declaration order.
    pub fn pool_specs(&self) -> Result<Vec<PoolSpec>, ConfigError> {
        if self.node.management_timeout_secs == 0 {
            return Err(invalid("node.management_timeout_secs", "must be at least 1"));
        }
        if self.pools.len() > MAX_POOLS {
            return Err(invalid(
                "pools",
                format!("at most {MAX_POOLS} pools are supported, found {}", self.pools.len()),
            ));
        }

        let mut seen = HashSet::new();
        self.pools
            .iter()
            .enumerate()
            .map(|(index, pool)| {
                if !seen.insert(pool.id.as_str()) {
                    return Err(invalid(
                        format!("pools[{index}].id"),
                        format!("duplicate pool id '{}'", pool.id),
                    ));
                }
                pool.to_spec(index)
            })
            .collect()
    }

    /// Plan every pool.
    pub fn pools(&self) -> Result<Vec<Pool>, ConfigError> {
        Ok(vpnfleet_core::plan_pools(self.pool_specs()?)?)
    }

    /// Fleet entries for the pool instances followed by `[[servers]]`.
    pub fn fleet_entries(&self, pools: &[Pool]) -> Result<Vec<FleetEntry>, ConfigError> {
        let mut entries = entries_for_pools(pools);
        let mut ids: HashSet<String> = entries.iter().map(|e| e.id.clone()).collect();

        for (index, server) in self.servers.iter().enumerate() {
            let field = format!("servers[{index}]");
            if !ids.insert(server.id.clone()) {
                return Err(invalid(
                    format!("{field}.id"),
                    format!("'{}' is already used by another server", server.id),
                ));
            }
            let endpoint: ManagementEndpoint = server
                .endpoint
                .parse()
                .map_err(|e: vpnfleet_api::Error| invalid(format!("{field}.endpoint"), e.to_string()))?;
            entries.push(FleetEntry {
                id: server.id.clone(),
                display_name: server.display_name.clone(),
                endpoint,
            });
        }
        Ok(entries)
    }
}

impl PoolConfig {
    fn to_spec(&self, index: usize) -> Result<PoolSpec, ConfigError> {
        let field = |name: &str| format!("pools[{index}].{name}");

        validate_id(&self.id).map_err(|reason| invalid(field("id"), reason))?;
        let longest_dev = format!("tun-{}-{MAX_INSTANCE_INDEX}", self.id);
        if longest_dev.len() > MAX_IFNAME_LEN {
            return Err(invalid(
                field("id"),
                format!("device name '{longest_dev}' exceeds {MAX_IFNAME_LEN} bytes"),
            ));
        }
        if self.ext_if.is_empty() || self.ext_if.len() > MAX_IFNAME_LEN {
            return Err(invalid(
                field("ext_if"),
                format!("interface name must be 1 to {MAX_IFNAME_LEN} bytes"),
            ));
        }

        let range = parse_block(&self.range, AddressFamily::V4, &field("range"))?;
        let range6 = parse_block(&self.range6, AddressFamily::V6, &field("range6"))?;
        let listen: IpAddr = self
            .listen
            .parse()
            .map_err(|_| invalid(field("listen"), format!("'{}' is not an IP address", self.listen)))?;
        let routes = self
            .routes
            .iter()
            .map(|r| AddressBlock::parse(r).map_err(|e| invalid(field("routes"), e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        let dns = self
            .dns
            .iter()
            .map(|d| {
                d.parse::<IpAddr>()
                    .map_err(|_| invalid(field("dns"), format!("'{d}' is not an IP address")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let pool_index = u32::try_from(index)
            .map_err(|_| invalid(field("id"), "too many pools"))?;

        Ok(PoolSpec {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            host_name: self.host_name.clone(),
            ext_if: self.ext_if.clone(),
            pool_index,
            range,
            range6,
            listen,
            routes,
            dns,
            dns_domain: self.dns_domain.clone(),
            use_nat: self.use_nat,
            default_gateway: self.default_gateway,
            client_to_client: self.client_to_client,
            two_factor: self.two_factor,
            enable_log: self.enable_log,
            enable_acl: self.enable_acl,
            acl_group_list: self.acl_group_list.clone(),
            block_smb: self.block_smb,
            forward6: self.forward6,
            fix_mtu: self.fix_mtu,
            hide_profile: self.hide_profile,
        })
    }
}

fn validate_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("must not be empty".into());
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(format!("'{id}' contains '{bad}'; use ASCII letters, digits, '-' or '_'"));
    }
    Ok(())
}

fn parse_block(text: &str, family: AddressFamily, field: &str) -> Result<AddressBlock, ConfigError> {
    let block = AddressBlock::parse(text).map_err(|e| invalid(field, e.to_string()))?;
    if block.family() != family {
        return Err(invalid(field, format!("'{text}' is not an {family} range")));
    }
    Ok(block)
}
