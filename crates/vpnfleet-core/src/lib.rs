//! Address planning, generation and fleet control for OpenVPN server pools.
//!
//! - **[`AddressBlock`]** IPv4/IPv6 CIDR arithmetic and splitting.
//! - **[`topology`]** derives the instances of a pool (address slices,
//!   ports, device names, management endpoints) from its [`PoolSpec`].
//! - **[`generate`]** server configuration and `iptables-restore` rules
//!   for the planned pools.
//! - **[`FleetController`]** concurrent `status` / `version` /
//!   `load-stats` / `kill` across every running instance, reported per
//!   server.
//! - **[`acl`]** the group-based access check exposed to the connect hook.

pub mod acl;
pub mod config;
pub mod error;
pub mod fleet;
pub mod generate;
pub mod model;
pub mod topology;

// ── Primary re-exports ──────────────────────────────────────────────
pub use acl::{AccessDecision, AclPolicy, GroupProvider, GroupProviderKind};
pub use config::NodeSettings;
pub use error::CoreError;
pub use fleet::FleetController;
pub use generate::{FirewallRules, ServerConfigs};
pub use topology::{plan_pool, plan_pools};

pub use model::{
    AddressBlock, AddressFamily, FleetEntry, Instance, LoadStats, Pool, PoolSpec, Proto,
    ServerOutcome, ServerReply, SessionRecord, UnavailableKind, VersionInfo,
};
