//! # Cache Module
//!
//! Client-side caches sitting between the UI and the Muse API.
//!
//! ## Components
//!
//! - [`MetadataCache`]: song/artist pages and totals, 7 day TTL
//! - [`ImageCacheWorker`]: resolves cover-art URLs on its own task, 24 hour TTL
//! - [`ImageRequestClient`]: per-URL request registry in front of the worker
//! - [`BlobRegistry`]: revocable object URLs for displayable image bytes
//!
//! ## Freshness policy
//!
//! A record is fresh while `now - timestamp < ttl`. Expired metadata is
//! still served while the client is offline. Online, the expired record is
//! dropped and the caller refetches.
//!
//! Storage failures never reach the caller: they are logged and treated as
//! a miss.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use muse_client::cache::{EntityKind, MetadataCache, METADATA_TTL};
//! use muse_client::runtime::{OnlineFlag, SystemClock};
//! use muse_client::storage::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let cache = MetadataCache::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(SystemClock),
//!     Arc::new(OnlineFlag::default()),
//!     METADATA_TTL,
//! );
//!
//! if cache.get_total(EntityKind::Songs).await.is_none() {
//!     // fetch from the API, then:
//!     cache.set_total(EntityKind::Songs, 412).await;
//! }
//! # }
//! ```

pub mod blob;
pub mod image_client;
pub mod image_worker;
pub mod metadata;

#[cfg(test)]
pub(crate) mod test_support;

pub use blob::{BlobRegistry, ObjectUrl};
pub use image_client::{ImageOutcome, ImageRequestClient};
pub use image_worker::{ImageCacheWorker, ImageJob, ImageLookup, WorkerReply, IMAGE_TTL};
pub use metadata::{EntityKind, MetadataCache, METADATA_TTL};

/// Hit/miss counters of a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    /// Expired entries served because the client was offline.
    pub stale_hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.stale_hits;
        if served + self.misses == 0 {
            0.0
        } else {
            served as f64 / (served + self.misses) as f64
        }
    }

    pub fn miss_rate(&self) -> f64 {
        1.0 - self.hit_rate()
    }
}
