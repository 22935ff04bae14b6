//! # Storage Module
//!
//! Durable key-value storage for cached metadata and cover art.
//!
//! Records live in namespaced tables (`songs`, `artists`, `images`) and are
//! keyed by string. Each record carries the timestamp of the write that
//! produced it; freshness is always decided by the reader, never stored.
//!
//! Two backends implement [`KeyValueStore`]:
//!
//! - [`JsonFileStore`]: one JSON document per key on disk, crash-safe writes
//! - [`MemoryStore`]: process-local fallback when the disk store can't open
//!
//! A failing store never breaks a user-facing operation. The caches log the
//! [`StoreError`] and carry on as if the key was missing.

pub mod file_store;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::{fmt, sync::Arc, time::Duration};

pub use crate::error::StoreError;
use crate::runtime::UnixMillis;
pub use file_store::JsonFileStore;
pub use memory::MemoryStore;

/// Logical table a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Songs,
    Artists,
    Images,
}

impl Namespace {
    pub const METADATA: [Namespace; 2] = [Namespace::Songs, Namespace::Artists];

    pub const fn as_str(self) -> &'static str {
        match self {
            Namespace::Songs => "songs",
            Namespace::Artists => "artists",
            Namespace::Images => "images",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary payload together with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub content_type: String,
    pub bytes: Bytes,
}

impl Blob {
    pub fn new(content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// What a record holds. `NotFound` is a cacheable answer, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum CachePayload {
    Json(Value),
    Blob(Blob),
    NotFound,
}

/// One stored entry. At most one exists per `(namespace, key)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub key: String,
    pub payload: CachePayload,
    pub timestamp: UnixMillis,
}

impl CacheRecord {
    pub fn new(key: impl Into<String>, payload: CachePayload, timestamp: UnixMillis) -> Self {
        Self {
            key: key.into(),
            payload,
            timestamp,
        }
    }

    /// `0 <= now - timestamp < ttl`. A timestamp from the future counts as
    /// expired.
    pub fn is_fresh(&self, now: UnixMillis, ttl: Duration) -> bool {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let age = now.saturating_sub(self.timestamp);
        (0..ttl_ms).contains(&age)
    }
}

/// Async get/put/delete contract over namespaced records.
///
/// Each call is its own transaction: a `get` never observes half of a `put`,
/// and a completed `put` is visible to every later `get` of the same key.
/// `put` is an upsert.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<CacheRecord>, StoreError>;

    async fn put(&self, namespace: Namespace, record: CacheRecord) -> Result<(), StoreError>;

    async fn delete(&self, namespace: Namespace, key: &str) -> Result<(), StoreError>;

    /// Deletes the record only while its timestamp is still `timestamp`.
    /// Returns whether a record was removed.
    async fn delete_if_unchanged(
        &self,
        namespace: Namespace,
        key: &str,
        timestamp: UnixMillis,
    ) -> Result<bool, StoreError>;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[test]
    fn freshness_is_strict_at_the_boundary() {
        let ttl_ms = DAY.as_millis() as i64;
        let record = CacheRecord::new("k", CachePayload::NotFound, 0);
        assert!(record.is_fresh(ttl_ms - 1, DAY));
        assert!(!record.is_fresh(ttl_ms, DAY));
        assert!(record.is_fresh(0, DAY));
    }

    #[test]
    fn record_from_the_future_is_expired() {
        let record = CacheRecord::new("k", CachePayload::NotFound, 10_000);
        assert!(!record.is_fresh(9_999, DAY));
        assert!(!record.is_fresh(i64::MIN, DAY));
    }

    #[test]
    fn namespace_names_match_table_names() {
        let names: Vec<_> = [Namespace::Songs, Namespace::Artists, Namespace::Images]
            .iter()
            .map(|ns| ns.to_string())
            .collect();
        assert_eq!(names, vec!["songs", "artists", "images"]);
    }
}
