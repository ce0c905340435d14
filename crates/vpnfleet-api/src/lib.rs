// vpnfleet-api: async client for the OpenVPN management-socket protocol

pub mod error;
pub mod management;
pub mod transport;

pub use error::Error;
pub use management::client::{ConnectionState, ManagementClient};
pub use management::replies::{LoadStats, VersionInfo};
pub use management::status::{SessionRecord, parse_status};
pub use transport::{ManagementEndpoint, TransportConfig};
