use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use super::{CacheRecord, KeyValueStore, Namespace, StoreError};
use crate::runtime::UnixMillis;

/// In-process store. Also used as the degraded fallback when the disk store
/// cannot be opened; its contents die with the process.
#[derive(Debug)]
pub struct MemoryStore {
    records: DashMap<(Namespace, String), CacheRecord>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Makes every call fail with `StoreError::Unavailable` while `false`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store switched off".into()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<CacheRecord>, StoreError> {
        self.check()?;
        Ok(self
            .records
            .get(&(namespace, key.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn put(&self, namespace: Namespace, record: CacheRecord) -> Result<(), StoreError> {
        self.check()?;
        debug!("memory put {}/{}", namespace, record.key);
        self.records.insert((namespace, record.key.clone()), record);
        Ok(())
    }

    async fn delete(&self, namespace: Namespace, key: &str) -> Result<(), StoreError> {
        self.check()?;
        self.records.remove(&(namespace, key.to_string()));
        Ok(())
    }

    async fn delete_if_unchanged(
        &self,
        namespace: Namespace,
        key: &str,
        timestamp: UnixMillis,
    ) -> Result<bool, StoreError> {
        self.check()?;
        Ok(self
            .records
            .remove_if(&(namespace, key.to_string()), |_, record| record.timestamp == timestamp)
            .is_some())
    }
}
