//!
//! # Watch subscription
//!
//! Keeps a handler informed of every change of one resource kind.
//! Lists everything first, then follows the watch stream from the list's version.
//! Lost streams are resumed, expired positions cause a full re-list.
//!
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tracing::{debug, error, info, trace, warn};

use fluvio_future::task::spawn;
use fluvio_future::timer::sleep;
use fluvio_types::event::StickyEvent;

use crate::config::SyncConfig;
use crate::k8_types::{Spec, K8Obj, K8Watch, LabelSelector};
use crate::store::{ResourceStore, SharedStore, StoreError, WatchStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WatchState {
    Stopped = 0,
    Starting = 1,
    Watching = 2,
    Error = 3,
}

impl WatchState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::Watching,
            3 => Self::Error,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for WatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Watching => "watching",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
struct SharedWatchState(AtomicU8);

impl SharedWatchState {
    fn new(state: WatchState) -> Arc<Self> {
        Arc::new(Self(AtomicU8::new(state as u8)))
    }

    fn get(&self) -> WatchState {
        WatchState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, state: WatchState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// Controls a running watch. Dropping the handle stops the watch.
#[must_use = "the watch stops when the handle is dropped"]
#[derive(Debug)]
pub struct WatchHandle {
    kind: String,
    state: Arc<SharedWatchState>,
    shutdown: Arc<StickyEvent>,
}

impl WatchHandle {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn state(&self) -> WatchState {
        self.state.get()
    }

    /// Stop the watch. Calling it more than once has no effect.
    pub fn stop(&self) {
        if !self.shutdown.is_set() {
            info!(kind = %self.kind, "stopping watch");
            self.shutdown.notify();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_set()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// why the watch loop gave up its current stream
enum Restart {
    Resync,
    Shutdown,
}

/// Background watch of resources of kind `S` in a single namespace
pub struct ResourceWatcher<S, C, F> {
    client: SharedStore<C>,
    namespace: String,
    selector: Option<LabelSelector>,
    resync_interval: Duration,
    retry_delay: Duration,
    handler: F,
    state: Arc<SharedWatchState>,
    shutdown: Arc<StickyEvent>,
    data: PhantomData<fn() -> S>,
}

impl<S, C, F> ResourceWatcher<S, C, F>
where
    S: Spec + 'static,
    S::Status: Send + Sync + 'static,
    S::Header: Send + Sync + 'static,
    C: ResourceStore + 'static,
    F: FnMut(K8Obj<S>) + Send + 'static,
{
    pub fn new(
        client: SharedStore<C>,
        namespace: impl Into<String>,
        selector: Option<LabelSelector>,
        config: &SyncConfig,
        handler: F,
    ) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            selector,
            resync_interval: config.resync_interval,
            retry_delay: config.watch_retry_delay,
            handler,
            state: SharedWatchState::new(WatchState::Stopped),
            shutdown: StickyEvent::shared(),
            data: PhantomData,
        }
    }

    /// spawn the watch loop
    pub fn start(self) -> WatchHandle {
        let handle = WatchHandle {
            kind: S::kind(),
            state: self.state.clone(),
            shutdown: self.shutdown.clone(),
        };
        self.state.set(WatchState::Starting);
        spawn(self.outer_loop());
        handle
    }

    async fn outer_loop(mut self) {
        use tokio::select;

        info!(kind = %S::kind(), namespace = %self.namespace, "starting watch loop");
        let shutdown = self.shutdown.clone();

        while !shutdown.is_set() {
            self.state.set(WatchState::Starting);
            match self.inner_loop().await {
                Ok(Restart::Resync) => {
                    debug!(kind = %S::kind(), "resync all");
                }
                Ok(Restart::Shutdown) => break,
                Err(err) => {
                    error!(kind = %S::kind(), namespace = %self.namespace, %err, "watch failed");
                    self.state.set(WatchState::Error);
                    select! {
                        _ = shutdown.listen() => break,
                        _ = sleep(self.retry_delay) => {
                            debug!(kind = %S::kind(), "retrying watch");
                        }
                    }
                }
            }
        }

        self.state.set(WatchState::Stopped);
        info!(kind = %S::kind(), namespace = %self.namespace, "watch loop terminated");
    }

    ///
    /// Watch Event Loop
    ///
    /// Returns when a full resync is due or the watch was stopped.
    ///
    async fn inner_loop(&mut self) -> Result<Restart, StoreError> {
        use tokio::select;

        // retrieve all items first, the watch starts at the list's version
        let mut resume_version = self.retrieve_all_items().await?;
        let mut stream = self.open_stream(resume_version.clone()).await?;
        self.state.set(WatchState::Watching);

        let shutdown = self.shutdown.clone();
        let mut resync_time_left = self.resync_interval;

        loop {
            let resync_time_mark = Instant::now();
            trace!(
                kind = %S::kind(),
                resync_secs_left = resync_time_left.as_secs(),
                "waiting for events"
            );

            select! {
                _ = shutdown.listen() => {
                    debug!(kind = %S::kind(), "shutdown received");
                    return Ok(Restart::Shutdown);
                },

                _ = sleep(resync_time_left) => {
                    debug!(kind = %S::kind(), "timer fired - kickoff re-sync all");
                    return Ok(Restart::Resync);
                },

                watch_result = stream.next() => {
                    match watch_result {
                        Some(Ok(events)) => {
                            for event in events {
                                resume_version = self.dispatch(event);
                            }
                        }
                        Some(Err(err)) => return Err(err),
                        None => {
                            debug!(
                                kind = %S::kind(),
                                version = %resume_version,
                                "watch stream terminated, reconnecting"
                            );
                            self.state.set(WatchState::Starting);
                            match self.open_stream(resume_version.clone()).await {
                                Ok(resumed) => {
                                    stream = resumed;
                                    self.state.set(WatchState::Watching);
                                }
                                Err(StoreError::Expired { version, .. }) => {
                                    warn!(kind = %S::kind(), %version, "watch position expired");
                                    return Ok(Restart::Resync);
                                }
                                Err(err) => return Err(err),
                            }
                        }
                    }

                    resync_time_left = resync_time_left.saturating_sub(resync_time_mark.elapsed());
                },
            }
        }
    }

    /// deliver every item to the handler, returns the list version
    async fn retrieve_all_items(&mut self) -> Result<String, StoreError> {
        let k8_objects = self
            .client
            .retrieve_items::<S>(&self.namespace, self.selector.as_ref())
            .await?;

        let version = k8_objects.metadata.resource_version;
        debug!(
            kind = %S::kind(),
            namespace = %self.namespace,
            items = k8_objects.items.len(),
            %version,
            "retrieved items"
        );
        for item in k8_objects.items {
            (self.handler)(item);
        }
        Ok(version)
    }

    async fn open_stream(&mut self, version: String) -> Result<WatchStream<S>, StoreError> {
        self.client
            .watch_stream_since::<S>(&self.namespace, self.selector.as_ref(), Some(version))
            .await
    }

    /// hand the changed object to the handler, returns its version
    fn dispatch(&mut self, event: K8Watch<S>) -> String {
        let k8_obj = match event {
            K8Watch::ADDED(obj) => {
                trace!(kind = %S::kind(), name = %obj.metadata.name, "added");
                obj
            }
            K8Watch::MODIFIED(obj) => {
                trace!(kind = %S::kind(), name = %obj.metadata.name, "modified");
                obj
            }
            K8Watch::DELETED(obj) => {
                trace!(kind = %S::kind(), name = %obj.metadata.name, "deleted");
                obj
            }
        };
        let version = k8_obj.metadata.resource_version.clone();
        (self.handler)(k8_obj);
        version
    }
}
