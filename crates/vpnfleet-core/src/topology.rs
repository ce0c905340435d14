// ── Pool topology ──
//
// Derives how many tunnel-server processes a pool runs and what each of
// them serves. Everything here is a pure function of the `PoolSpec`, so
// generators and the fleet controller agree without sharing state.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use tracing::debug;

use crate::error::CoreError;
use crate::model::{AddressBlock, AddressFamily, Instance, Pool, PoolSpec, Proto};

/// First tunnel listen port; UDP instances count up from here.
pub const BASE_PORT: u16 = 1194;
/// First management port; instance `i` uses `MANAGEMENT_BASE_PORT + i`.
pub const MANAGEMENT_BASE_PORT: u16 = 11940;

/// Number of instances for a pool whose IPv4 range has `range`'s prefix.
pub fn instance_count(range: &AddressBlock) -> Result<u32, CoreError> {
    require_family(range, AddressFamily::V4, "pool range")?;
    match range.prefix() {
        29 | 30 => Ok(1),
        25..=28 => Ok(2),
        24 => Ok(4),
        0..=23 => Ok(8),
        _ => Err(CoreError::InsufficientAddressSpace {
            block: range.to_string(),
        }),
    }
}

/// Management address of a pool: `127.42.<poolIndex>.1`.
pub fn management_ip(pool_index: u32) -> Result<Ipv4Addr, CoreError> {
    let octet = u8::try_from(pool_index).map_err(|_| {
        CoreError::config(format!("pool index {pool_index} is out of range (0-255)"))
    })?;
    Ok(Ipv4Addr::new(127, 42, octet, 1))
}

/// Derive the full topology of one pool.
pub fn plan_pool(spec: PoolSpec) -> Result<Pool, CoreError> {
    require_family(&spec.range6, AddressFamily::V6, "pool range6")?;
    let count = instance_count(&spec.range)?;
    let management_ip = management_ip(spec.pool_index)?;

    let ranges = spec.range.split(count)?;
    let ranges6 = spec.range6.split(count)?;

    let instances = ranges
        .into_iter()
        .zip(ranges6)
        .zip(0u16..)
        .map(|((range, range6), i)| {
            let proto = if count > 1 && u32::from(i) == count - 1 {
                Proto::Tcp
            } else {
                Proto::Udp
            };
            Instance {
                index: u32::from(i),
                dev_name: format!("tun-{}-{i}", spec.id),
                range,
                range6,
                proto,
                port: match proto {
                    Proto::Udp => BASE_PORT + i,
                    Proto::Tcp => BASE_PORT,
                },
                management_port: MANAGEMENT_BASE_PORT + i,
            }
        })
        .collect::<Vec<_>>();

    debug!(pool = %spec.id, instances = instances.len(), %management_ip, "planned pool topology");
    Ok(Pool {
        spec,
        management_ip,
        instances,
    })
}

/// Plan every pool, rejecting duplicate ids and pool indices.
pub fn plan_pools(specs: Vec<PoolSpec>) -> Result<Vec<Pool>, CoreError> {
    let mut ids = HashSet::new();
    let mut indices = HashSet::new();
    for spec in &specs {
        if !ids.insert(spec.id.as_str()) {
            return Err(CoreError::config(format!("duplicate pool id '{}'", spec.id)));
        }
        if !indices.insert(spec.pool_index) {
            return Err(CoreError::config(format!(
                "pool index {} is used by more than one pool",
                spec.pool_index
            )));
        }
    }
    specs.into_iter().map(plan_pool).collect()
}

/// Largest instance count of any pool; sizes the management port range.
pub fn max_instances(pools: &[Pool]) -> usize {
    pools.iter().map(|p| p.instances.len()).max().unwrap_or(0)
}

fn require_family(block: &AddressBlock, expected: AddressFamily, what: &str) -> Result<(), CoreError> {
    if block.family() == expected {
        Ok(())
    } else {
        Err(CoreError::FamilyMismatch {
            operation: what.to_owned(),
            expected,
            block: block.to_string(),
        })
    }
}
