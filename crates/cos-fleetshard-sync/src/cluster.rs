//!
//! # Cluster registration
//!
//! Find-or-create of the single `ManagedConnectorCluster` of this cluster.
//! Callers in the same process are serialized, concurrent creators in other
//! processes are resolved after the fact: the earliest registration wins and
//! the others delete themselves.
//!
//! Earliest means lowest resource version, the store's own write order.
//! Creation timestamps come from clocks that need not agree and are ignored.
//! A registration only gets a new version through `register` itself, which
//! returns before the check when the registration already existed.
//!
use async_lock::Mutex;
use tracing::{debug, info, warn};

use cos_fleetshard_api::{LABEL_CLUSTER_ID, ManagedConnectorCluster, ManagedConnectorClusterSpec};

use crate::config::SyncConfig;
use crate::resources::{cluster_selector, new_cluster_registration};
use crate::store::{DeletePropagation, ResourceStore, SharedStore};
use crate::{Result, SyncError};

const KIND: &str = "ManagedConnectorCluster";

pub struct ClusterRegistrar<C> {
    client: SharedStore<C>,
    cluster_id: String,
    namespace: String,
    max_attempts: u32,
    lock: Mutex<()>,
}

impl<C> ClusterRegistrar<C>
where
    C: ResourceStore,
{
    pub fn new(client: SharedStore<C>, config: &SyncConfig) -> Self {
        Self {
            client,
            cluster_id: config.cluster_id.clone(),
            namespace: config.connectors_namespace.clone(),
            max_attempts: config.max_edit_attempts,
            lock: Mutex::new(()),
        }
    }

    /// registration of this cluster if there is one
    pub async fn get(&self) -> Result<Option<ManagedConnectorCluster>> {
        let mut items = self.list().await?;
        match items.len() {
            0 => Ok(None),
            1 => Ok(items.pop()),
            count => {
                warn!(cluster_id = %self.cluster_id, count, "multiple cluster registrations");
                Err(SyncError::MultipleRegistrations(self.cluster_id.clone()))
            }
        }
    }

    /// Make sure this cluster is registered exactly once and return the registration.
    pub async fn register(&self) -> Result<ManagedConnectorCluster> {
        let _guard = self.lock.lock().await;

        let mut winner: Option<ManagedConnectorCluster> = None;
        for attempt in 1..=self.max_attempts {
            let (mut cluster, fresh) = match winner.take() {
                Some(existing) => (existing, false),
                None => match self.get().await? {
                    Some(existing) => (existing, false),
                    None => (
                        new_cluster_registration(&self.cluster_id, &self.namespace),
                        true,
                    ),
                },
            };

            cluster.spec.cluster_id = self.cluster_id.clone();
            cluster
                .metadata
                .labels
                .insert(LABEL_CLUSTER_ID.to_owned(), self.cluster_id.clone());

            let stored = match self.client.create_or_replace(&self.namespace, cluster).await {
                Ok(stored) => stored,
                Err(err) if err.is_conflict() => {
                    warn!(attempt, %err, "registration conflict, retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            if !fresh {
                debug!(name = %stored.metadata.name, "cluster registration updated");
                return Ok(stored);
            }

            // another process may have created one at the same time
            match self.earliest().await? {
                Some(earliest) if earliest.metadata.name != stored.metadata.name => {
                    info!(
                        name = %stored.metadata.name,
                        winner = %earliest.metadata.name,
                        "concurrent registration found, removing ours"
                    );
                    self.client
                        .delete_item::<ManagedConnectorClusterSpec>(
                            &self.namespace,
                            &stored.metadata.name,
                            DeletePropagation::Foreground,
                        )
                        .await?;
                    winner = Some(earliest);
                }
                _ => {
                    info!(name = %stored.metadata.name, cluster_id = %self.cluster_id, "cluster registered");
                    return Ok(stored);
                }
            }
        }

        Err(SyncError::SyncFailure {
            kind: KIND.to_owned(),
            name: self.cluster_id.clone(),
            attempts: self.max_attempts,
        })
    }

    async fn list(&self) -> Result<Vec<ManagedConnectorCluster>> {
        let selector = cluster_selector(&self.cluster_id);
        let list = self
            .client
            .retrieve_items::<ManagedConnectorClusterSpec>(&self.namespace, Some(&selector))
            .await?;
        Ok(list.items)
    }

    /// first written registration, ties broken by name
    async fn earliest(&self) -> Result<Option<ManagedConnectorCluster>> {
        let items = self.list().await?;
        Ok(first_written(items))
    }
}

fn first_written(items: Vec<ManagedConnectorCluster>) -> Option<ManagedConnectorCluster> {
    items.into_iter().min_by(|a, b| write_order(a).cmp(&write_order(b)))
}

/// unparsable versions sort last
fn write_order(cluster: &ManagedConnectorCluster) -> (u64, &str) {
    let version = cluster
        .metadata
        .resource_version
        .parse::<u64>()
        .unwrap_or(u64::MAX);
    (version, cluster.metadata.name.as_str())
}
