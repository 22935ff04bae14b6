use dashmap::DashMap;
use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tracing::debug;

use crate::storage::Blob;

/// Revocable handle to a blob held in memory, the `blob:` URL equivalent.
///
/// Whoever receives an `ObjectUrl` owns it and must call
/// [`BlobRegistry::revoke`] once the image is no longer shown.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Table of live object URLs. Cloning shares the same table.
#[derive(Debug, Clone, Default)]
pub struct BlobRegistry {
    blobs: Arc<DashMap<ObjectUrl, Blob>>,
    next_id: Arc<AtomicU64>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, blob: Blob) -> ObjectUrl {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let url = ObjectUrl(format!("blob:muse/{}", id));
        self.blobs.insert(url.clone(), blob);
        url
    }

    pub fn resolve(&self, url: &ObjectUrl) -> Option<Blob> {
        self.blobs.get(url).map(|entry| entry.value().clone())
    }

    /// Releases the blob. Returns `false` if the URL was already revoked.
    pub fn revoke(&self, url: &ObjectUrl) -> bool {
        let removed = self.blobs.remove(url).is_some();
        if removed {
            debug!("🗑️ Revoked {}", url);
        }
        removed
    }

    pub fn live(&self) -> usize {
        self.blobs.len()
    }
}
