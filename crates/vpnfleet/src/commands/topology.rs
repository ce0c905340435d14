//! `topology` handler: the planned instances of every pool.

use serde::Serialize;
use tabled::Tabled;

use vpnfleet_core::{AddressBlock, Pool, Proto};

use crate::cli::GlobalOpts;
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

/// One planned instance, flattened for display.
#[derive(Debug, Serialize)]
struct PlannedInstance {
    id: String,
    pool: String,
    device: String,
    proto: Proto,
    port: u16,
    range: AddressBlock,
    range6: AddressBlock,
    management: String,
}

fn planned_instances(pools: &[Pool]) -> Vec<PlannedInstance> {
    pools
        .iter()
        .flat_map(|pool| {
            pool.instances.iter().map(move |i| PlannedInstance {
                id: i.key(pool.id()),
                pool: pool.spec.display_name.clone(),
                device: i.dev_name.clone(),
                proto: i.proto,
                port: i.port,
                range: i.range,
                range6: i.range6,
                management: format!("{}:{}", pool.management_ip, i.management_port),
            })
        })
        .collect()
}

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct InstanceRow {
    #[tabled(rename = "Instance")]
    id: String,
    #[tabled(rename = "Pool")]
    pool: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Listen")]
    listen: String,
    #[tabled(rename = "IPv4")]
    range: String,
    #[tabled(rename = "IPv6")]
    range6: String,
    #[tabled(rename = "Management")]
    management: String,
}

impl From<&PlannedInstance> for InstanceRow {
    fn from(p: &PlannedInstance) -> Self {
        Self {
            id: p.id.clone(),
            pool: p.pool.clone(),
            device: p.device.clone(),
            listen: format!("{}/{}", p.port, p.proto),
            range: p.range.to_string(),
            range6: p.range6.to_string(),
            management: p.management.clone(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let pools = config::require_pools(cfg, global)?;
    let planned = planned_instances(&pools);

    let out = output::render_list(&global.output, &planned, |p| InstanceRow::from(p), |p| {
        p.id.clone()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
