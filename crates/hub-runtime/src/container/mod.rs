//! # Service Container
//!
//! Builds the bucket store selected by configuration and the History
//! service on top of it.

pub mod config;

pub use config::{ConfigError, HubConfig, StorageConfig, StoreBackend};

use anyhow::{Context, Result};
use hub_history::HistoryService;
use shared_buckets::{BucketStore, InMemoryBucketStore};
use std::sync::Arc;
use tracing::info;

/// Open the configured bucket store.
pub fn build_store(storage: &StorageConfig) -> Result<Arc<dyn BucketStore>> {
    match storage.backend {
        StoreBackend::Memory => {
            info!("Using in-memory bucket store; history is lost on exit");
            Ok(Arc::new(InMemoryBucketStore::new()))
        }
        StoreBackend::RocksDb => open_rocksdb(storage),
    }
}

#[cfg(feature = "rocksdb")]
fn open_rocksdb(storage: &StorageConfig) -> Result<Arc<dyn BucketStore>> {
    use crate::adapters::storage::{RocksBucketStore, RocksStoreConfig};

    std::fs::create_dir_all(&storage.data_dir)
        .with_context(|| format!("Failed to create data dir {}", storage.data_dir.display()))?;
    let store = RocksBucketStore::open(RocksStoreConfig::at(storage.data_dir.join("history")))
        .context("Failed to open RocksDB bucket store")?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "rocksdb"))]
fn open_rocksdb(_storage: &StorageConfig) -> Result<Arc<dyn BucketStore>> {
    Err(ConfigError::BackendUnavailable.into())
}

/// Build the History service over the configured store.
pub fn build_history(config: &HubConfig) -> Result<Arc<HistoryService>> {
    let store = build_store(&config.storage)?;
    let service = HistoryService::new(store, config.history.clone())
        .context("Failed to create History service")?;
    Ok(Arc::new(service))
}
