use serde_json::Value;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, warn};

use super::CacheMetrics;
use crate::{
    runtime::{Clock, Connectivity},
    storage::{CachePayload, CacheRecord, Namespace, SharedStore},
};

/// Default retention for song/artist listings and totals.
pub const METADATA_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Browsable entity families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Songs,
    Artists,
}

impl EntityKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            EntityKind::Songs => "songs",
            EntityKind::Artists => "artists",
        }
    }

    pub const fn namespace(self) -> Namespace {
        match self {
            EntityKind::Songs => Namespace::Songs,
            EntityKind::Artists => Namespace::Artists,
        }
    }

    /// Key of the `{kind}_total` record kept next to the pages.
    pub fn total_key(self) -> String {
        format!("{}_total", self.as_str())
    }

    /// Key of a list page, e.g. `songs_0_36`.
    pub fn page_key(self, start: usize, end: usize) -> String {
        format!("{}_{}_{}", self.as_str(), start, end)
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Cache-aside layer for listings and totals.
///
/// Expired records are only served while the client is offline. When a
/// refresh is possible the record is deleted and the caller refetches.
pub struct MetadataCache {
    store: SharedStore,
    clock: Arc<dyn Clock>,
    connectivity: Arc<dyn Connectivity>,
    ttl: Duration,
    counters: Counters,
}

impl MetadataCache {
    pub fn new(
        store: SharedStore,
        clock: Arc<dyn Clock>,
        connectivity: Arc<dyn Connectivity>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            connectivity,
            ttl,
            counters: Counters::default(),
        }
    }

    pub async fn get_entity(&self, kind: EntityKind, key: &str) -> Option<Value> {
        self.lookup(kind.namespace(), key).await
    }

    pub async fn set_entity(&self, kind: EntityKind, key: &str, value: Value) {
        self.write(kind.namespace(), key, value).await;
    }

    pub async fn get_total(&self, kind: EntityKind) -> Option<u64> {
        let key = kind.total_key();
        let value = self.lookup(kind.namespace(), &key).await?;
        match value.as_u64() {
            Some(total) => Some(total),
            None => {
                warn!("Ignoring non-numeric {} record: {}", key, value);
                None
            }
        }
    }

    pub async fn set_total(&self, kind: EntityKind, total: u64) {
        self.write(kind.namespace(), &kind.total_key(), Value::from(total))
            .await;
    }

    pub fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.counters.hits.load(Ordering::Relaxed),
            stale_hits: self.counters.stale_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }

    async fn lookup(&self, namespace: Namespace, key: &str) -> Option<Value> {
        let record = match self.store.get(namespace, key).await {
            Ok(Some(record)) => record,
            Ok(None) => return self.miss(namespace, key),
            Err(e) => {
                warn!("⚠️ Metadata store read failed for {}/{}: {}", namespace, key, e);
                return self.miss(namespace, key);
            }
        };

        let fresh = record.is_fresh(self.clock.now_millis(), self.ttl);
        let timestamp = record.timestamp;
        let data = match record.payload {
            CachePayload::Json(data) => data,
            other => {
                warn!("Unexpected payload in {}/{}: {:?}", namespace, key, other);
                return self.miss(namespace, key);
            }
        };

        if fresh {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!("✅ Cache hit {}/{}", namespace, key);
            return Some(data);
        }

        if !self.connectivity.is_online() {
            self.counters.stale_hits.fetch_add(1, Ordering::Relaxed);
            debug!("📴 Offline, serving stale {}/{}", namespace, key);
            return Some(data);
        }

        // A write that landed after the read carries a newer timestamp and stays.
        match self.store.delete_if_unchanged(namespace, key, timestamp).await {
            Ok(true) => {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                debug!("⏰ Expired entry removed {}/{}", namespace, key);
            }
            Ok(false) => debug!("Entry {}/{} was rewritten meanwhile", namespace, key),
            Err(e) => warn!("⚠️ Could not evict {}/{}: {}", namespace, key, e),
        }
        self.miss(namespace, key)
    }

    async fn write(&self, namespace: Namespace, key: &str, value: Value) {
        let record = CacheRecord::new(key, CachePayload::Json(value), self.clock.now_millis());
        if let Err(e) = self.store.put(namespace, record).await {
            warn!("⚠️ Metadata store write failed for {}/{}: {}", namespace, key, e);
        }
    }

    fn miss(&self, namespace: Namespace, key: &str) -> Option<Value> {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!("❌ Cache miss {}/{}", namespace, key);
        None
    }
}
