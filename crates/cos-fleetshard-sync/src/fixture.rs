use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_channel::Receiver;
use async_trait::async_trait;
use tokio::select;

use fluvio_future::timer::sleep;

use cos_fleetshard_api::operator::ManagedConnectorOperatorSpec;
use cos_fleetshard_api::{ManagedConnector, ManagedConnectorOperator, ManagedConnectorSpec};

use crate::config::SyncConfig;
use crate::k8_types::{K8List, K8Obj, LabelSelector, Spec};
use crate::resources::{cluster_selector, new_connector};
use crate::store::{DeletePropagation, MemoryStore, ResourceStore, StoreError, WatchStream};
use crate::watch::{WatchHandle, WatchState};

pub const CONNECTORS_NS: &str = "connectors";
pub const OPERATORS_NS: &str = "operators";

pub fn test_config(cluster_id: &str) -> SyncConfig {
    SyncConfig::new(cluster_id, CONNECTORS_NS, OPERATORS_NS)
        .with_watch_retry_delay(Duration::from_millis(20))
}

/// connector of `cluster_id` at the given deployment revision
pub fn connector(cluster_id: &str, deployment_id: &str, revision: u64) -> ManagedConnector {
    let mut spec = ManagedConnectorSpec {
        connector_id: format!("conn-{deployment_id}"),
        connector_type_id: "log_sink_0.1".to_owned(),
        ..Default::default()
    };
    spec.deployment.deployment_resource_version = revision;
    new_connector(cluster_id, CONNECTORS_NS, deployment_id, spec).expect("fixture connector")
}

pub fn operator(name: &str, type_: &str, version: &str) -> ManagedConnectorOperator {
    ManagedConnectorOperator::new(
        name,
        ManagedConnectorOperatorSpec {
            type_: type_.to_owned(),
            version: version.to_owned(),
            runtime: "camel".to_owned(),
        },
    )
}

pub fn selector_for(cluster_id: &str) -> LabelSelector {
    cluster_selector(cluster_id)
}

pub async fn recv_within<T>(receiver: &Receiver<T>, wait: Duration) -> Option<T> {
    select! {
        item = receiver.recv() => item.ok(),
        _ = sleep(wait) => None,
    }
}

/// poll until the watch reaches `state`, false on timeout
pub async fn wait_for_state(handle: &WatchHandle, state: WatchState, wait: Duration) -> bool {
    let poll = Duration::from_millis(5);
    let mut waited = Duration::ZERO;
    while waited < wait {
        if handle.state() == state {
            return true;
        }
        sleep(poll).await;
        waited += poll;
    }
    handle.state() == state
}

/// store whose watch streams take a while to open
#[derive(Default)]
pub struct SlowWatchStore {
    pub inner: MemoryStore,
    watch_delay_ms: AtomicU64,
}

impl SlowWatchStore {
    pub fn set_watch_delay(&self, delay: Duration) {
        self.watch_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResourceStore for SlowWatchStore {
    async fn retrieve_item<S>(&self, namespace: &str, name: &str) -> Result<K8Obj<S>, StoreError>
    where
        S: Spec,
    {
        self.inner.retrieve_item(namespace, name).await
    }

    async fn retrieve_items<S>(
        &self,
        namespace: &str,
        selector: Option<&LabelSelector>,
    ) -> Result<K8List<S>, StoreError>
    where
        S: Spec,
    {
        self.inner.retrieve_items(namespace, selector).await
    }

    async fn create_or_replace<S>(
        &self,
        namespace: &str,
        value: K8Obj<S>,
    ) -> Result<K8Obj<S>, StoreError>
    where
        S: Spec,
    {
        self.inner.create_or_replace(namespace, value).await
    }

    async fn delete_item<S>(
        &self,
        namespace: &str,
        name: &str,
        propagation: DeletePropagation,
    ) -> Result<bool, StoreError>
    where
        S: Spec,
    {
        self.inner.delete_item::<S>(namespace, name, propagation).await
    }

    async fn watch_stream_since<S>(
        &self,
        namespace: &str,
        selector: Option<&LabelSelector>,
        resource_version: Option<String>,
    ) -> Result<WatchStream<S>, StoreError>
    where
        S: Spec + 'static,
        S::Status: 'static,
        S::Header: 'static,
    {
        let delay = self.watch_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            sleep(Duration::from_millis(delay)).await;
        }
        self.inner
            .watch_stream_since(namespace, selector, resource_version)
            .await
    }
}
