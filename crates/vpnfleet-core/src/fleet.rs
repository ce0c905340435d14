// ── Fleet controller ──
//
// Runtime control plane over every tunnel-server process. Each server
// has one slot holding at most one open `ManagementClient`; operations
// fan out to all slots concurrently and come back as one labelled reply
// per server. A failing server never fails the whole operation.

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use vpnfleet_api::{ManagementClient, ManagementEndpoint, TransportConfig};

use crate::error::CoreError;
use crate::model::{
    FleetEntry, LoadStats, Pool, ServerOutcome, ServerReply, SessionRecord, UnavailableKind,
    VersionInfo,
};

struct Slot {
    entry: FleetEntry,
    client: Mutex<Option<ManagementClient>>,
}

/// Fans management commands out to every server of the fleet.
pub struct FleetController {
    slots: Vec<Slot>,
    transport: TransportConfig,
}

impl FleetController {
    /// Controller over explicit entries. Connections are opened lazily.
    pub fn new(entries: Vec<FleetEntry>, transport: TransportConfig) -> Self {
        let slots = entries
            .into_iter()
            .map(|entry| Slot {
                entry,
                client: Mutex::new(None),
            })
            .collect();
        Self { slots, transport }
    }

    /// One entry per instance of every pool.
    pub fn from_pools(pools: &[Pool], transport: TransportConfig) -> Self {
        Self::new(entries_for_pools(pools), transport)
    }

    pub fn entries(&self) -> impl Iterator<Item = &FleetEntry> {
        self.slots.iter().map(|s| &s.entry)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    // ── Operations ──────────────────────────────────────────────────

    /// Connected sessions, per server.
    pub async fn status(&self) -> Vec<ServerReply<Vec<SessionRecord>>> {
        self.fan_out("status", |client| client.status().boxed()).await
    }

    pub async fn version(&self) -> Vec<ServerReply<VersionInfo>> {
        self.fan_out("version", |client| client.version().boxed()).await
    }

    pub async fn load_stats(&self) -> Vec<ServerReply<LoadStats>> {
        self.fan_out("load-stats", |client| client.load_stats().boxed())
            .await
    }

    /// Disconnect `common_name` everywhere. `true` means that server
    /// found and killed at least one session.
    pub async fn kill(&self, common_name: &str) -> Vec<ServerReply<bool>> {
        self.fan_out("kill", |client| {
            let common_name = common_name.to_owned();
            async move { client.kill(&common_name).await }.boxed()
        })
        .await
    }

    /// All sessions of all reachable servers as `(serverId, session)`.
    pub async fn sessions(&self) -> Vec<(String, SessionRecord)> {
        self.status()
            .await
            .into_iter()
            .filter_map(|reply| match reply.outcome {
                ServerOutcome::Available { value } => Some((reply.server_id, value)),
                ServerOutcome::Unavailable { .. } => None,
            })
            .flat_map(|(server, records)| {
                records.into_iter().map(move |r| (server.clone(), r))
            })
            .collect()
    }

    /// Drop every open connection.
    pub async fn close_all(&self) {
        for slot in &self.slots {
            if let Some(mut client) = slot.client.lock().await.take() {
                client.close();
            }
        }
    }

    // ── Fan-out ─────────────────────────────────────────────────────

    async fn fan_out<T, F>(&self, operation: &str, op: F) -> Vec<ServerReply<T>>
    where
        F: for<'c> Fn(&'c mut ManagementClient) -> BoxFuture<'c, Result<T, vpnfleet_api::Error>>,
    {
        debug!(operation, servers = self.slots.len(), "fleet fan-out");
        let futs = self.slots.iter().map(|slot| self.query(slot, operation, &op));
        join_all(futs).await
    }

    async fn query<T, F>(&self, slot: &Slot, operation: &str, op: &F) -> ServerReply<T>
    where
        F: for<'c> Fn(&'c mut ManagementClient) -> BoxFuture<'c, Result<T, vpnfleet_api::Error>>,
    {
        let outcome = match self.run(slot, op).await {
            Ok(value) => ServerOutcome::Available { value },
            Err(e) => {
                let kind = UnavailableKind::from(&e);
                let err = CoreError::from(e);
                warn!(server = %slot.entry.id, operation, %kind, error = %err, "server unavailable");
                ServerOutcome::Unavailable {
                    kind,
                    reason: err.to_string(),
                }
            }
        };
        ServerReply {
            server_id: slot.entry.id.clone(),
            display_name: slot.entry.display_name.clone(),
            outcome,
        }
    }

    /// Run `op` on the slot's connection, opening it first if needed.
    /// A connection left unusable by the command is dropped so the next
    /// call re-opens it.
    async fn run<T, F>(&self, slot: &Slot, op: &F) -> Result<T, vpnfleet_api::Error>
    where
        F: for<'c> Fn(&'c mut ManagementClient) -> BoxFuture<'c, Result<T, vpnfleet_api::Error>>,
    {
        let mut guard = slot.client.lock().await;

        if !guard.as_ref().is_some_and(ManagementClient::is_open) {
            let client = ManagementClient::connect(&slot.entry.endpoint, &self.transport).await?;
            *guard = Some(client);
        }
        let Some(client) = guard.as_mut() else {
            return Err(vpnfleet_api::Error::Closed);
        };

        let result = op(&mut *client).await;
        if !client.is_open() {
            *guard = None;
        }
        result
    }
}

/// Fleet entries for every instance of every pool.
pub fn entries_for_pools(pools: &[Pool]) -> Vec<FleetEntry> {
    pools
        .iter()
        .flat_map(|pool| {
            pool.instances.iter().map(move |instance| FleetEntry {
                id: instance.key(pool.id()),
                display_name: format!("{} #{}", pool.spec.display_name, instance.index),
                endpoint: ManagementEndpoint::Tcp(
                    (pool.management_ip, instance.management_port).into(),
                ),
            })
        })
        .collect()
}
