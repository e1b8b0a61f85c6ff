//!
//! # Fleet shard client
//!
//! Single entry point of the reconciliation logic into cluster state.
//! Every connector read and write is scoped to the configured cluster identity.
//!
use std::collections::BTreeMap;

use tracing::{debug, instrument, trace, warn};

use cos_fleetshard_api::{
    ConnectorSecret, ConnectorSecretSpec, LABEL_CLUSTER_ID, LABEL_DEPLOYMENT_ID, ManagedConnector,
    ManagedConnectorCluster, ManagedConnectorOperator, ManagedConnectorOperatorSpec,
    ManagedConnectorSpec, Operator,
};

use crate::cluster::ClusterRegistrar;
use crate::config::SyncConfig;
use crate::k8_types::{K8Obj, Spec};
use crate::resources::{
    cluster_selector, connector_id, connector_owner_reference, new_connector_secret, secret_name,
};
use crate::store::{DeletePropagation, ResourceStore, SharedStore};
use crate::watch::{ResourceWatcher, WatchHandle};
use crate::{Result, SyncError};

pub struct FleetShardClient<C> {
    client: SharedStore<C>,
    config: SyncConfig,
    registrar: ClusterRegistrar<C>,
}

impl<C> FleetShardClient<C>
where
    C: ResourceStore + 'static,
{
    pub fn new(client: SharedStore<C>, config: SyncConfig) -> Result<Self> {
        config.validate()?;
        let registrar = ClusterRegistrar::new(client.clone(), &config);
        Ok(Self {
            client,
            config,
            registrar,
        })
    }

    pub fn cluster_id(&self) -> &str {
        &self.config.cluster_id
    }

    pub fn connectors_namespace(&self) -> &str {
        &self.config.connectors_namespace
    }

    pub fn operators_namespace(&self) -> &str {
        &self.config.operators_namespace
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &SharedStore<C> {
        &self.client
    }

    // connectors

    #[instrument(skip(self))]
    pub async fn get_connector_by_deployment_id(
        &self,
        deployment_id: &str,
    ) -> Result<Option<ManagedConnector>> {
        let name = connector_id(deployment_id)?;
        self.get_connector_by_name(&name).await
    }

    /// Connector with that name, `None` when it is absent or belongs to another cluster
    #[instrument(skip(self))]
    pub async fn get_connector_by_name(&self, name: &str) -> Result<Option<ManagedConnector>> {
        let connector = self
            .get_optional::<ManagedConnectorSpec>(self.connectors_namespace(), name)
            .await?;
        Ok(connector.filter(|connector| self.is_scoped(connector)))
    }

    /// all connectors of this cluster
    #[instrument(skip(self))]
    pub async fn list_all_connectors(&self) -> Result<Vec<ManagedConnector>> {
        let selector = cluster_selector(self.cluster_id());
        let list = self
            .client
            .retrieve_items::<ManagedConnectorSpec>(self.connectors_namespace(), Some(&selector))
            .await?;
        debug!(count = list.items.len(), "connectors listed");
        Ok(list.items)
    }

    /// Highest deployment revision among the connectors of this cluster, 0 if there are none.
    /// Used as the "changes since" position when polling the fleet manager.
    #[instrument(skip(self))]
    pub async fn max_deployment_revision(&self) -> Result<u64> {
        let revision = self
            .list_all_connectors()
            .await?
            .iter()
            .map(|connector| connector.spec.deployment_resource_version())
            .max()
            .unwrap_or(0);
        debug!(revision, "max deployment revision");
        Ok(revision)
    }

    /// Create the connector or replace it as a whole.
    /// The connector is always written to the connectors namespace with this cluster's label.
    #[instrument(skip(self, connector), fields(name = %connector.metadata.name))]
    pub async fn create_or_replace_connector(
        &self,
        mut connector: ManagedConnector,
    ) -> Result<ManagedConnector> {
        self.scope_connector(&mut connector);
        connector.metadata.resource_version.clear();
        let stored = self
            .client
            .create_or_replace(self.connectors_namespace(), connector)
            .await?;
        debug!(revision = %stored.metadata.resource_version, "connector stored");
        Ok(stored)
    }

    /// Read-modify-write of a connector.
    /// `mutator` is applied to the latest stored version, again after every conflicting write.
    /// A connector of another cluster is reported as `NotFound`.
    #[instrument(skip(self, mutator))]
    pub async fn edit_connector<F>(&self, name: &str, mut mutator: F) -> Result<ManagedConnector>
    where
        F: FnMut(&mut ManagedConnector) + Send,
    {
        let max_attempts = self.config.max_edit_attempts;
        for attempt in 1..=max_attempts {
            let mut connector = self
                .client
                .retrieve_item::<ManagedConnectorSpec>(self.connectors_namespace(), name)
                .await?;
            if !self.is_scoped(&connector) {
                debug!(name, "connector belongs to another cluster");
                return Err(SyncError::NotFound {
                    kind: ManagedConnectorSpec::kind(),
                    name: name.to_owned(),
                });
            }
            let version = connector.metadata.resource_version.clone();

            mutator(&mut connector);
            self.scope_connector(&mut connector);
            connector.metadata.name = name.to_owned();
            connector.metadata.resource_version = version;

            match self
                .client
                .create_or_replace(self.connectors_namespace(), connector)
                .await
            {
                Ok(stored) => {
                    debug!(attempt, revision = %stored.metadata.resource_version, "connector edited");
                    return Ok(stored);
                }
                Err(err) if err.is_conflict() => {
                    warn!(attempt, max_attempts, "conflicting connector update, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(SyncError::SyncFailure {
            kind: ManagedConnectorSpec::kind(),
            name: name.to_owned(),
            attempts: max_attempts,
        })
    }

    /// Delete the connector and everything it owns.
    /// False if it was already gone or belongs to another cluster.
    #[instrument(skip(self, connector), fields(name = %connector.metadata.name))]
    pub async fn delete_connector(&self, connector: &ManagedConnector) -> Result<bool> {
        if self
            .get_connector_by_name(&connector.metadata.name)
            .await?
            .is_none()
        {
            debug!("no connector of this cluster to delete");
            return Ok(false);
        }

        let deleted = self
            .client
            .delete_item::<ManagedConnectorSpec>(
                self.connectors_namespace(),
                &connector.metadata.name,
                DeletePropagation::Foreground,
            )
            .await?;
        debug!(deleted, "connector delete");
        Ok(deleted)
    }

    pub fn watch_all_connectors<F>(&self, handler: F) -> WatchHandle
    where
        F: FnMut(ManagedConnector) + Send + 'static,
    {
        ResourceWatcher::new(
            self.client.clone(),
            self.connectors_namespace(),
            Some(cluster_selector(self.cluster_id())),
            &self.config,
            handler,
        )
        .start()
    }

    // secrets

    #[instrument(skip(self))]
    pub async fn get_secret_by_deployment_id(
        &self,
        deployment_id: &str,
    ) -> Result<Option<ConnectorSecret>> {
        let name = secret_name(deployment_id)?;
        self.get_optional::<ConnectorSecretSpec>(self.connectors_namespace(), &name)
            .await
    }

    /// existing secret of the deployment, or a new empty one
    #[instrument(skip(self))]
    pub async fn get_or_create_secret(&self, deployment_id: &str) -> Result<ConnectorSecret> {
        if let Some(secret) = self.get_secret_by_deployment_id(deployment_id).await? {
            trace!(name = %secret.metadata.name, "secret exists");
            return Ok(secret);
        }

        let secret =
            new_connector_secret(self.connectors_namespace(), deployment_id, BTreeMap::new())?;
        self.create_or_replace_secret(secret).await
    }

    /// Replace the secret as a whole.
    /// A secret without owner is bound to the connector of its deployment when there is one.
    #[instrument(skip(self, secret), fields(name = %secret.metadata.name))]
    pub async fn create_or_replace_secret(
        &self,
        mut secret: ConnectorSecret,
    ) -> Result<ConnectorSecret> {
        secret.metadata.namespace = self.connectors_namespace().to_owned();
        secret.metadata.resource_version.clear();

        if secret.metadata.owner_references.is_empty() {
            if let Some(deployment_id) = secret.metadata.labels.get(LABEL_DEPLOYMENT_ID).cloned() {
                if let Some(connector) = self.get_connector_by_deployment_id(&deployment_id).await? {
                    debug!(connector = %connector.metadata.name, "binding secret to connector");
                    secret
                        .metadata
                        .owner_references
                        .push(connector_owner_reference(&connector));
                }
            }
        }

        let stored = self
            .client
            .create_or_replace(self.connectors_namespace(), secret)
            .await?;
        debug!(revision = %stored.metadata.resource_version, "secret stored");
        Ok(stored)
    }

    // operators

    /// operators installed on the cluster, not scoped by cluster identity
    #[instrument(skip(self))]
    pub async fn lookup_operators(&self) -> Result<Vec<Operator>> {
        let list = self
            .client
            .retrieve_items::<ManagedConnectorOperatorSpec>(self.operators_namespace(), None)
            .await?;
        Ok(list.items.iter().map(Operator::from).collect())
    }

    pub fn watch_all_operators<F>(&self, handler: F) -> WatchHandle
    where
        F: FnMut(ManagedConnectorOperator) + Send + 'static,
    {
        ResourceWatcher::new(
            self.client.clone(),
            self.operators_namespace(),
            None,
            &self.config,
            handler,
        )
        .start()
    }

    // cluster

    #[instrument(skip(self))]
    pub async fn register_cluster(&self) -> Result<ManagedConnectorCluster> {
        self.registrar.register().await
    }

    #[instrument(skip(self))]
    pub async fn get_connector_cluster(&self) -> Result<Option<ManagedConnectorCluster>> {
        self.registrar.get().await
    }

    fn is_scoped(&self, connector: &ManagedConnector) -> bool {
        connector
            .metadata
            .labels
            .get(LABEL_CLUSTER_ID)
            .is_some_and(|cluster_id| cluster_id == self.cluster_id())
    }

    fn scope_connector(&self, connector: &mut ManagedConnector) {
        connector.metadata.namespace = self.connectors_namespace().to_owned();
        connector
            .metadata
            .labels
            .insert(LABEL_CLUSTER_ID.to_owned(), self.cluster_id().to_owned());
    }

    async fn get_optional<S>(&self, namespace: &str, name: &str) -> Result<Option<K8Obj<S>>>
    where
        S: Spec,
    {
        match self.client.retrieve_item::<S>(namespace, name).await {
            Ok(item) => Ok(Some(item)),
            Err(err) if err.is_not_found() => {
                trace!(kind = %S::kind(), name, "not found");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}
