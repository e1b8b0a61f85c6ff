//!
//! # Backing store
//!
//! Contract the synchronization client needs from the resource API server:
//! strongly consistent reads, label scoped lists and watches, optimistic
//! concurrency on writes and cascading deletes.
//!
mod error;
mod memory;

pub use error::StoreError;
pub use memory::MemoryStore;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::k8_types::{Spec, K8Obj, K8List, K8Watch, LabelSelector};

pub type SharedStore<C> = std::sync::Arc<C>;

/// stream of watch events, each item is a batch received from the store
pub type WatchStream<S> = BoxStream<'static, Result<Vec<K8Watch<S>>, StoreError>>;

/// What happens to objects owned by a deleted object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePropagation {
    /// dependents are removed before the delete completes
    #[default]
    Foreground,
    /// dependents are removed after the owner is gone
    Background,
    /// dependents are left in place
    Orphan,
}

impl DeletePropagation {
    pub fn is_cascading(&self) -> bool {
        !matches!(self, Self::Orphan)
    }
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// get a single object, fails with `NotFound` when absent
    async fn retrieve_item<S>(&self, namespace: &str, name: &str) -> Result<K8Obj<S>, StoreError>
    where
        S: Spec;

    /// list objects in namespace, optionally restricted to those matching selector
    async fn retrieve_items<S>(
        &self,
        namespace: &str,
        selector: Option<&LabelSelector>,
    ) -> Result<K8List<S>, StoreError>
    where
        S: Spec;

    /// Create the object or replace it wholesale.
    /// When `metadata.resource_version` is set it must match the stored version,
    /// otherwise the write fails with `Conflict`.
    async fn create_or_replace<S>(
        &self,
        namespace: &str,
        value: K8Obj<S>,
    ) -> Result<K8Obj<S>, StoreError>
    where
        S: Spec;

    /// returns false if there was nothing to delete
    async fn delete_item<S>(
        &self,
        namespace: &str,
        name: &str,
        propagation: DeletePropagation,
    ) -> Result<bool, StoreError>
    where
        S: Spec;

    /// Watch changes after `resource_version`, or from now on when not given.
    /// Fails with `Expired` when the store no longer has history for that version.
    async fn watch_stream_since<S>(
        &self,
        namespace: &str,
        selector: Option<&LabelSelector>,
        resource_version: Option<String>,
    ) -> Result<WatchStream<S>, StoreError>
    where
        S: Spec + 'static,
        S::Status: 'static,
        S::Header: 'static;
}
