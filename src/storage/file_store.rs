use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};
use tokio::{fs, sync::Mutex};
use tracing::{debug, info, warn};

use super::{Blob, CachePayload, CacheRecord, KeyValueStore, Namespace, StoreError};
use crate::runtime::UnixMillis;

/// Bumped whenever the on-disk record layout changes.
const SCHEMA_VERSION: u32 = 1;
const MANIFEST_FILE: &str = "store.json";
const LOCK_STRIPES: usize = 16;

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    name: String,
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum StoredPayload {
    Json { data: Value },
    Blob { content_type: String, data: String },
    NotFound,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    key: String,
    timestamp: i64,
    payload: StoredPayload,
}

impl From<&CacheRecord> for StoredRecord {
    fn from(record: &CacheRecord) -> Self {
        let payload = match &record.payload {
            CachePayload::Json(data) => StoredPayload::Json { data: data.clone() },
            CachePayload::Blob(blob) => StoredPayload::Blob {
                content_type: blob.content_type.clone(),
                data: STANDARD.encode(&blob.bytes),
            },
            CachePayload::NotFound => StoredPayload::NotFound,
        };
        Self {
            key: record.key.clone(),
            timestamp: record.timestamp,
            payload,
        }
    }
}

impl TryFrom<StoredRecord> for CacheRecord {
    type Error = StoreError;

    fn try_from(stored: StoredRecord) -> Result<Self, Self::Error> {
        let payload = match stored.payload {
            StoredPayload::Json { data } => CachePayload::Json(data),
            StoredPayload::Blob { content_type, data } => {
                let bytes = STANDARD.decode(data).map_err(|e| StoreError::Corrupt {
                    key: stored.key.clone(),
                    reason: e.to_string(),
                })?;
                CachePayload::Blob(Blob::new(content_type, bytes))
            }
            StoredPayload::NotFound => CachePayload::NotFound,
        };
        Ok(CacheRecord::new(stored.key, payload, stored.timestamp))
    }
}

/// Disk-backed store: `<root>/<namespace>/<sha256(key)>.json`.
///
/// Writes land in a temporary file that is renamed over the target, so a
/// concurrent reader sees either the old or the new record. Operations on
/// the same key are additionally serialized through striped locks.
#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    locks: Vec<Mutex<()>>,
    tmp_seq: AtomicU64,
}

impl JsonFileStore {
    /// Opens (or creates) the store at `root` and makes sure every namespace
    /// directory exists. A schema version mismatch drops the old records.
    pub async fn open(
        root: impl Into<PathBuf>,
        name: &str,
        namespaces: &[Namespace],
    ) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;

        let manifest_path = root.join(MANIFEST_FILE);
        let outdated = match fs::read_to_string(&manifest_path).await {
            Ok(content) => match serde_json::from_str::<Manifest>(&content) {
                Ok(manifest) => manifest.version != SCHEMA_VERSION,
                Err(e) => {
                    warn!("Unreadable manifest in {}: {}", root.display(), e);
                    true
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        if outdated {
            warn!("Store {} has an old schema, clearing it", name);
            for namespace in namespaces {
                let dir = root.join(namespace.as_str());
                match fs::remove_dir_all(&dir).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        for namespace in namespaces {
            fs::create_dir_all(root.join(namespace.as_str())).await?;
        }

        let manifest = Manifest {
            name: name.to_string(),
            version: SCHEMA_VERSION,
        };
        fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?).await?;

        info!("📁 Store '{}' opened at {}", name, root.display());

        Ok(Self {
            root,
            locks: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
            tmp_seq: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn digest(namespace: Namespace, key: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(namespace.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(key.as_bytes());
        hasher.finalize().into()
    }

    fn record_path(&self, namespace: Namespace, digest: &[u8; 32]) -> PathBuf {
        self.root
            .join(namespace.as_str())
            .join(format!("{}.json", hex::encode(digest)))
    }

    fn lock_for(&self, digest: &[u8; 32]) -> &Mutex<()> {
        &self.locks[digest[0] as usize % LOCK_STRIPES]
    }

    /// Caller must hold the key's stripe lock.
    async fn read_record(path: &Path, key: &str) -> Result<Option<CacheRecord>, StoreError> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredRecord = serde_json::from_str(&content)?;
        if stored.key != key {
            return Err(StoreError::Corrupt {
                key: key.to_string(),
                reason: format!("file holds key {}", stored.key),
            });
        }
        CacheRecord::try_from(stored).map(Some)
    }

    async fn remove_record(path: &Path) -> Result<(), StoreError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<CacheRecord>, StoreError> {
        let digest = Self::digest(namespace, key);
        let path = self.record_path(namespace, &digest);
        let _guard = self.lock_for(&digest).lock().await;
        Self::read_record(&path, key).await
    }

    async fn put(&self, namespace: Namespace, record: CacheRecord) -> Result<(), StoreError> {
        let digest = Self::digest(namespace, &record.key);
        let path = self.record_path(namespace, &digest);
        let content = serde_json::to_vec(&StoredRecord::from(&record))?;
        let _guard = self.lock_for(&digest).lock().await;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("json.tmp{}", seq));
        fs::write(&tmp, content).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!("💾 {}/{} written", namespace, record.key);
        Ok(())
    }

    async fn delete(&self, namespace: Namespace, key: &str) -> Result<(), StoreError> {
        let digest = Self::digest(namespace, key);
        let path = self.record_path(namespace, &digest);
        let _guard = self.lock_for(&digest).lock().await;
        Self::remove_record(&path).await
    }

    async fn delete_if_unchanged(
        &self,
        namespace: Namespace,
        key: &str,
        timestamp: UnixMillis,
    ) -> Result<bool, StoreError> {
        let digest = Self::digest(namespace, key);
        let path = self.record_path(namespace, &digest);
        let _guard = self.lock_for(&digest).lock().await;

        match Self::read_record(&path, key).await? {
            Some(record) if record.timestamp == timestamp => {
                Self::remove_record(&path).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
