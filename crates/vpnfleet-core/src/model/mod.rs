// ── Domain model ──

pub mod address;
pub mod fleet;
pub mod pool;

pub use address::{AddressBlock, AddressFamily};
pub use fleet::{FleetEntry, ServerOutcome, ServerReply, UnavailableKind};
pub use pool::{Instance, Pool, PoolSpec, Proto};
pub use vpnfleet_api::{LoadStats, SessionRecord, VersionInfo};
