use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_channel::{Sender, unbounded};
use async_lock::{Mutex, RwLock};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use futures_util::StreamExt;
use serde_yaml::Value;
use tracing::{debug, trace};

use crate::k8_types::{Spec, K8Obj, K8List, K8Watch, LabelSelector, ListMetadata, ObjectMeta};
use crate::resources::selector_matches;

use super::{DeletePropagation, ResourceStore, StoreError, WatchStream};

/// number of events kept per kind for resuming watches
const MAX_HISTORY: usize = 1024;

/// In memory implementation of the store contract.
/// Objects are kept as yaml values, one spec store per kind.
#[derive(Debug, Default)]
pub struct MemoryStore {
    stores: Mutex<HashMap<String, Arc<SpecStore>>>,
    version: AtomicU64,
    unavailable: AtomicBool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ObjectKey {
    namespace: String,
    name: String,
}

impl ObjectKey {
    fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        }
    }
}

type DeletedEvent = fn(Value, u64) -> Result<Value, serde_yaml::Error>;

#[derive(Debug)]
struct SpecStore {
    kind: String,
    deleted_event: DeletedEvent,
    state: RwLock<SpecState>,
}

#[derive(Debug, Default)]
struct SpecState {
    items: HashMap<ObjectKey, Value>,
    history: VecDeque<WatchRecord>,
    /// highest revision dropped from history
    compacted: u64,
    watchers: Vec<Watcher>,
}

#[derive(Debug, Clone)]
struct WatchRecord {
    revision: u64,
    namespace: String,
    labels: HashMap<String, String>,
    event: Value,
}

#[derive(Debug)]
struct Watcher {
    namespace: String,
    selector: Option<LabelSelector>,
    sender: Sender<Value>,
}

impl Watcher {
    fn accepts(&self, record: &WatchRecord) -> bool {
        self.namespace == record.namespace
            && self
                .selector
                .as_ref()
                .map(|selector| selector_matches(selector, &record.labels))
                .unwrap_or(true)
    }
}

/// the deleted object is reported with the revision of the delete
fn deleted_event<S: Spec>(value: Value, revision: u64) -> Result<Value, serde_yaml::Error> {
    let mut k8_obj: K8Obj<S> = serde_yaml::from_value(value)?;
    k8_obj.metadata.resource_version = revision.to_string();
    serde_yaml::to_value(K8Watch::DELETED(k8_obj))
}

fn object_meta(value: &Value) -> Result<ObjectMeta, serde_yaml::Error> {
    match value.get("metadata") {
        Some(meta) => serde_yaml::from_value(meta.clone()),
        None => Ok(ObjectMeta::default()),
    }
}

impl SpecState {
    fn record(&mut self, record: WatchRecord) {
        self.watchers.retain(|watcher| !watcher.sender.is_closed());
        for watcher in self.watchers.iter().filter(|w| w.accepts(&record)) {
            let _ = watcher.sender.try_send(record.event.clone());
        }

        if self.history.len() == MAX_HISTORY {
            if let Some(dropped) = self.history.pop_front() {
                self.compacted = dropped.revision;
            }
        }
        self.history.push_back(record);
    }

    fn remove(
        &mut self,
        key: &ObjectKey,
        revision: u64,
        deleted_event: DeletedEvent,
    ) -> Result<Option<ObjectMeta>, serde_yaml::Error> {
        let Some(value) = self.items.remove(key) else {
            return Ok(None);
        };
        let meta = object_meta(&value)?;
        let event = deleted_event(value, revision)?;
        self.record(WatchRecord {
            revision,
            namespace: key.namespace.clone(),
            labels: meta.labels.clone(),
            event,
        });
        Ok(Some(meta))
    }
}

impl SpecStore {
    fn new<S: Spec>() -> Self {
        Self {
            kind: S::kind(),
            deleted_event: deleted_event::<S>,
            state: RwLock::new(SpecState::default()),
        }
    }

    /// remove all objects in namespace owned by `owner_uid`, returns uids of removed objects
    async fn remove_owned_by(
        &self,
        namespace: &str,
        owner_uid: &str,
        version: &AtomicU64,
    ) -> Result<Vec<String>, StoreError> {
        let mut state = self.state.write().await;
        let mut owned = vec![];
        for (key, value) in state.items.iter() {
            if key.namespace != namespace {
                continue;
            }
            let meta = object_meta(value)?;
            if meta.owner_references.iter().any(|owner| owner.uid == owner_uid) {
                owned.push(key.clone());
            }
        }

        let mut removed = vec![];
        for key in owned {
            let revision = version.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(meta) = state.remove(&key, revision, self.deleted_event)? {
                debug!(kind = %self.kind, name = %key.name, owner_uid, "removed dependent");
                removed.push(meta.uid);
            }
        }
        Ok(removed)
    }
}

impl MemoryStore {
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// simulate an outage, every call fails with `Unavailable` while set
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// terminate all open watch streams as a server side timeout would
    pub async fn disconnect_watchers(&self) {
        let stores: Vec<Arc<SpecStore>> = self.stores.lock().await.values().cloned().collect();
        for store in stores {
            let mut state = store.state.write().await;
            debug!(kind = %store.kind, watchers = state.watchers.len(), "disconnecting watchers");
            state.watchers.clear();
        }
    }

    /// drop all retained history, older watch positions become expired
    pub async fn compact_history(&self) {
        let stores: Vec<Arc<SpecStore>> = self.stores.lock().await.values().cloned().collect();
        for store in stores {
            let mut state = store.state.write().await;
            state.history.clear();
            state.compacted = self.current_version();
        }
    }

    /// number of watch streams of kind `S` that are still open
    pub async fn active_watchers<S: Spec>(&self) -> usize {
        let store = self.get_store::<S>().await;
        let state = store.state.read().await;
        state
            .watchers
            .iter()
            .filter(|watcher| !watcher.sender.is_closed())
            .count()
    }

    fn current_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    fn next_revision(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store is offline".to_owned()))
        } else {
            Ok(())
        }
    }

    async fn get_store<S: Spec>(&self) -> Arc<SpecStore> {
        let kind: String = S::kind();
        let mut stores = self.stores.lock().await;
        stores
            .entry(kind)
            .or_insert_with(|| Arc::new(SpecStore::new::<S>()))
            .clone()
    }

    async fn remove_dependents(&self, namespace: &str, uid: String) -> Result<(), StoreError> {
        let mut owners = vec![uid];
        while let Some(owner_uid) = owners.pop() {
            let stores: Vec<Arc<SpecStore>> =
                self.stores.lock().await.values().cloned().collect();
            for store in stores {
                let removed = store
                    .remove_owned_by(namespace, &owner_uid, &self.version)
                    .await?;
                owners.extend(removed);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn retrieve_item<S>(&self, namespace: &str, name: &str) -> Result<K8Obj<S>, StoreError>
    where
        S: Spec,
    {
        self.check_available()?;
        let store = self.get_store::<S>().await;
        let state = store.state.read().await;
        let Some(value) = state.items.get(&ObjectKey::new(namespace, name)) else {
            return Err(StoreError::NotFound {
                kind: S::kind(),
                name: name.to_owned(),
            });
        };

        Ok(serde_yaml::from_value(value.clone())?)
    }

    async fn retrieve_items<S>(
        &self,
        namespace: &str,
        selector: Option<&LabelSelector>,
    ) -> Result<K8List<S>, StoreError>
    where
        S: Spec,
    {
        self.check_available()?;
        let store = self.get_store::<S>().await;
        let state = store.state.read().await;
        let resource_version = self.current_version().to_string();

        let mut items = vec![];
        for (key, value) in state.items.iter() {
            if key.namespace != namespace {
                continue;
            }
            let k8_obj: K8Obj<S> = serde_yaml::from_value(value.clone())?;
            if let Some(selector) = selector {
                if !selector_matches(selector, &k8_obj.metadata.labels) {
                    continue;
                }
            }
            items.push(k8_obj);
        }
        drop(state);
        items.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));

        trace!(kind = %S::kind(), namespace, count = items.len(), "listed");
        Ok(K8List {
            api_version: S::api_version(),
            kind: S::kind(),
            metadata: ListMetadata {
                _continue: None,
                resource_version,
            },
            items,
        })
    }

    async fn create_or_replace<S>(
        &self,
        namespace: &str,
        mut value: K8Obj<S>,
    ) -> Result<K8Obj<S>, StoreError>
    where
        S: Spec,
    {
        self.check_available()?;
        let name = value.metadata.name.clone();
        if name.is_empty() {
            return Err(StoreError::Invalid(format!("{} without name", S::kind())));
        }

        let store = self.get_store::<S>().await;
        let key = ObjectKey::new(namespace, &name);
        let mut state = store.state.write().await;

        let existing: Option<ObjectMeta> = state.items.get(&key).map(object_meta).transpose()?;
        let requested = std::mem::take(&mut value.metadata.resource_version);

        match &existing {
            Some(old) => {
                if !requested.is_empty() && requested != old.resource_version {
                    return Err(StoreError::Conflict {
                        kind: S::kind(),
                        name,
                        expected: requested,
                        actual: old.resource_version.clone(),
                    });
                }
                value.metadata.uid = old.uid.clone();
                value.metadata.creation_timestamp = old.creation_timestamp.clone();
            }
            None => {
                if !requested.is_empty() {
                    // stale copy of an object that no longer exists
                    return Err(StoreError::Conflict {
                        kind: S::kind(),
                        name,
                        expected: requested,
                        actual: String::new(),
                    });
                }
                value.metadata.uid = uuid::Uuid::new_v4().to_string();
                value.metadata.creation_timestamp =
                    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
            }
        }

        let revision = self.next_revision();
        value.metadata.namespace = namespace.to_owned();
        value.metadata.resource_version = revision.to_string();

        state.items.insert(key, serde_yaml::to_value(&value)?);

        let watch = if existing.is_some() {
            K8Watch::MODIFIED(value.clone())
        } else {
            K8Watch::ADDED(value.clone())
        };
        state.record(WatchRecord {
            revision,
            namespace: namespace.to_owned(),
            labels: value.metadata.labels.clone(),
            event: serde_yaml::to_value(watch)?,
        });
        drop(state);

        debug!(kind = %S::kind(), name = %value.metadata.name, revision, "stored");
        Ok(value)
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
        self.check_available()?;
        let store = self.get_store::<S>().await;
        let mut state = store.state.write().await;
        let revision = self.next_revision();
        let removed = state.remove(
            &ObjectKey::new(namespace, name),
            revision,
            store.deleted_event,
        )?;
        drop(state);

        let Some(meta) = removed else {
            debug!(kind = %S::kind(), name, "nothing to delete");
            return Ok(false);
        };

        debug!(kind = %S::kind(), name, ?propagation, "deleted");
        if propagation.is_cascading() {
            self.remove_dependents(namespace, meta.uid).await?;
        }
        Ok(true)
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
        self.check_available()?;
        let since = match resource_version.as_deref() {
            Some(version) => Some(version.parse::<u64>().map_err(|err| {
                StoreError::Invalid(format!("resource version '{version}': {err}"))
            })?),
            None => None,
        };

        let store = self.get_store::<S>().await;
        let mut state = store.state.write().await;

        let (sender, receiver) = unbounded();
        let watcher = Watcher {
            namespace: namespace.to_owned(),
            selector: selector.cloned(),
            sender,
        };

        if let Some(since) = since {
            if since < state.compacted {
                return Err(StoreError::Expired {
                    kind: S::kind(),
                    version: since.to_string(),
                });
            }
            for record in state.history.iter() {
                if record.revision > since && watcher.accepts(record) {
                    let _ = watcher.sender.try_send(record.event.clone());
                }
            }
        }
        state.watchers.push(watcher);
        drop(state);

        debug!(kind = %S::kind(), namespace, ?since, "watch opened");
        Ok(receiver
            .map(|value| {
                serde_yaml::from_value::<K8Watch<S>>(value)
                    .map(|event| vec![event])
                    .map_err(StoreError::from)
            })
            .boxed())
    }
}
