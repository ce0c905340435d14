// ── Pool and instance types ──
//
// A `PoolSpec` is what an operator configures; a `Pool` is the same
// policy plus everything derived from it by the topology planner
// (management address and the instance partition). Instances are never
// built by hand, only by `topology::plan_pool`.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::address::AddressBlock;

/// Transport protocol an instance listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Proto {
    Udp,
    Tcp,
}

/// Operator-supplied description of one pool (tenant profile).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSpec {
    /// Short identifier used in device, chain and file names.
    pub id: String,
    pub display_name: String,
    /// Public name clients connect to.
    pub host_name: String,
    /// Egress interface for NAT and forwarding rules.
    pub ext_if: String,
    /// Stable ordinal of the pool, fixed at configuration load.
    pub pool_index: u32,
    pub range: AddressBlock,
    pub range6: AddressBlock,
    /// Address the tunnel servers bind to.
    pub listen: IpAddr,
    pub routes: Vec<AddressBlock>,
    pub dns: Vec<IpAddr>,
    pub dns_domain: Option<String>,
    pub use_nat: bool,
    pub default_gateway: bool,
    pub client_to_client: bool,
    pub two_factor: bool,
    pub enable_log: bool,
    pub enable_acl: bool,
    pub acl_group_list: Vec<String>,
    pub block_smb: bool,
    pub forward6: bool,
    pub fix_mtu: bool,
    /// Carried through for portal front-ends; no effect on generation.
    pub hide_profile: bool,
}

impl PoolSpec {
    /// A pool with the given ranges and every optional policy switched off.
    pub fn new(id: impl Into<String>, range: AddressBlock, range6: AddressBlock) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            host_name: "localhost".into(),
            ext_if: "eth0".into(),
            pool_index: 0,
            range,
            range6,
            listen: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            routes: Vec::new(),
            dns: Vec::new(),
            dns_domain: None,
            use_nat: false,
            default_gateway: false,
            client_to_client: false,
            two_factor: false,
            enable_log: false,
            enable_acl: false,
            acl_group_list: Vec::new(),
            block_smb: false,
            forward6: true,
            fix_mtu: false,
            hide_profile: false,
        }
    }
}

/// One tunnel-server process serving a slice of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub index: u32,
    pub dev_name: String,
    pub range: AddressBlock,
    pub range6: AddressBlock,
    pub proto: Proto,
    pub port: u16,
    pub management_port: u16,
}

impl Instance {
    /// Fleet-wide key, `<poolId>-<index>`.
    pub fn key(&self, pool_id: &str) -> String {
        format!("{pool_id}-{}", self.index)
    }
}

/// A pool together with its derived topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    #[serde(flatten)]
    pub spec: PoolSpec,
    pub management_ip: Ipv4Addr,
    pub instances: Vec<Instance>,
}

impl Pool {
    pub fn id(&self) -> &str {
        &self.spec.id
    }

    /// Configured routes of one family, in declaration order.
    pub fn routes_v4(&self) -> impl Iterator<Item = &AddressBlock> {
        self.spec.routes.iter().filter(|r| r.is_ipv4())
    }

    pub fn routes_v6(&self) -> impl Iterator<Item = &AddressBlock> {
        self.spec.routes.iter().filter(|r| r.is_ipv6())
    }
}
