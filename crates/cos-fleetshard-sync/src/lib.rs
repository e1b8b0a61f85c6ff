pub mod client;
pub mod cluster;
pub mod config;
pub mod resources;
pub mod store;
pub mod watch;

mod error;

#[cfg(test)]
mod fixture;

pub use error::{Result, SyncError};
pub use client::FleetShardClient;
pub use config::SyncConfig;
pub use watch::{WatchHandle, WatchState};

pub use cos_fleetshard_api as api;
pub use cos_fleetshard_api::k8_types;
