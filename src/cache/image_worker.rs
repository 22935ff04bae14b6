use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    runtime::Clock,
    sources::{AuthHeaders, ImageFetcher, DEFAULT_IMAGE_TYPE},
    storage::{Blob, CachePayload, CacheRecord, Namespace, SharedStore},
};

/// Default retention for cover art and "no cover" answers.
pub const IMAGE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Result of resolving one image URL.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageLookup {
    Found(Blob),
    NotFound,
}

/// A request handed to the worker task.
#[derive(Debug, Clone)]
pub struct ImageJob {
    pub url: String,
    pub headers: AuthHeaders,
}

/// The worker's answer for `url`. `cached` tells whether the network was
/// skipped.
#[derive(Debug, Clone)]
pub struct WorkerReply {
    pub url: String,
    pub lookup: ImageLookup,
    pub cached: bool,
}

/// Resolves image URLs against the image store, falling back to the network.
///
/// Failed fetches are remembered as `NotFound` records for the TTL so a
/// missing cover is not requested again on every render.
pub struct ImageCacheWorker {
    store: SharedStore,
    fetcher: Arc<dyn ImageFetcher>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ImageCacheWorker {
    pub fn new(
        store: SharedStore,
        fetcher: Arc<dyn ImageFetcher>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            fetcher,
            clock,
            ttl,
        }
    }

    pub async fn resolve(&self, url: &str, headers: &AuthHeaders) -> WorkerReply {
        let now = self.clock.now_millis();
        let mut persist = true;

        match self.store.get(Namespace::Images, url).await {
            Ok(Some(record)) if record.is_fresh(now, self.ttl) => match record.payload {
                CachePayload::Blob(blob) => {
                    debug!("✅ Image cache hit {}", url);
                    return reply(url, ImageLookup::Found(blob), true);
                }
                CachePayload::NotFound => {
                    debug!("✅ Cached miss for {}", url);
                    return reply(url, ImageLookup::NotFound, true);
                }
                CachePayload::Json(_) => {
                    warn!("Image record for {} holds JSON, refetching", url);
                }
            },
            Ok(Some(record)) => {
                debug!("⏰ Image entry expired {}", url);
                if let Err(e) = self
                    .store
                    .delete_if_unchanged(Namespace::Images, url, record.timestamp)
                    .await
                {
                    warn!("⚠️ Could not evict image {}: {}", url, e);
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("⚠️ Image store unavailable, going to network: {}", e);
                persist = false;
            }
        }

        let lookup = match self.fetcher.fetch_image(url, headers).await {
            Ok(image) if image.is_success() && !image.body.is_empty() => {
                let content_type = image
                    .content_type
                    .filter(|ct| !ct.is_empty())
                    .unwrap_or_else(|| DEFAULT_IMAGE_TYPE.to_string());
                ImageLookup::Found(Blob::new(content_type, image.body))
            }
            Ok(image) => {
                debug!("No image at {} (status {}, {} bytes)", url, image.status, image.body.len());
                ImageLookup::NotFound
            }
            Err(e) => {
                warn!("❌ Image fetch failed for {}: {}", url, e);
                ImageLookup::NotFound
            }
        };

        if persist {
            let payload = match &lookup {
                ImageLookup::Found(blob) => CachePayload::Blob(blob.clone()),
                ImageLookup::NotFound => CachePayload::NotFound,
            };
            if let Err(e) = self
                .store
                .put(Namespace::Images, CacheRecord::new(url, payload, now))
                .await
            {
                warn!("⚠️ Could not store image {}: {}", url, e);
            }
        }

        reply(url, lookup, false)
    }

    /// Moves the worker onto its own task.
    ///
    /// Jobs are resolved concurrently; every job produces exactly one reply.
    /// The task ends once all job senders are dropped, after in-flight jobs
    /// have delivered their replies.
    pub fn spawn(
        self,
        capacity: usize,
    ) -> (
        mpsc::Sender<ImageJob>,
        mpsc::UnboundedReceiver<WorkerReply>,
        JoinHandle<()>,
    ) {
        let (job_tx, mut job_rx) = mpsc::channel::<ImageJob>(capacity);
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let worker = Arc::new(self);

        let handle = tokio::spawn(async move {
            info!("🖼️ Image worker started");
            let mut in_flight = Vec::new();
            while let Some(job) = job_rx.recv().await {
                let worker = worker.clone();
                let reply_tx = reply_tx.clone();
                in_flight.retain(|task: &JoinHandle<()>| !task.is_finished());
                in_flight.push(tokio::spawn(async move {
                    let reply = worker.resolve(&job.url, &job.headers).await;
                    if reply_tx.send(reply).is_err() {
                        debug!("Reply for {} dropped, client gone", job.url);
                    }
                }));
            }
            for task in in_flight {
                let _ = task.await;
            }
            info!("🖼️ Image worker stopped");
        });

        (job_tx, reply_rx, handle)
    }
}

fn reply(url: &str, lookup: ImageLookup, cached: bool) -> WorkerReply {
    WorkerReply {
        url: url.to_string(),
        lookup,
        cached,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::test_support::{SpyFetcher, SpyResponse},
        runtime::ManualClock,
        storage::{KeyValueStore, MemoryStore},
    };
    use pretty_assertions::assert_eq;

    const URL: &str = "http://localhost:8080/api/songs/cover?name=A&artist_name=X";
    const NOW: i64 = 1_700_000_000_000;

    fn worker(fetcher: Arc<SpyFetcher>) -> (ImageCacheWorker, Arc<MemoryStore>, ManualClock) {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(NOW);
        let worker = ImageCacheWorker::new(store.clone(), fetcher, Arc::new(clock.clone()), IMAGE_TTL);
        (worker, store, clock)
    }

    #[tokio::test]
    async fn not_found_is_cached_for_the_ttl() {
        let fetcher = Arc::new(SpyFetcher::status(404));
        let (worker, store, clock) = worker(fetcher.clone());

        let first = worker.resolve(URL, &AuthHeaders::none()).await;
        assert_eq!(first.lookup, ImageLookup::NotFound);
        assert!(!first.cached);
        let record = store.get(Namespace::Images, URL).await.unwrap().unwrap();
        assert_eq!(record.payload, CachePayload::NotFound);

        clock.advance(IMAGE_TTL.as_millis() as i64 - 1);
        let second = worker.resolve(URL, &AuthHeaders::none()).await;
        assert_eq!(second.lookup, ImageLookup::NotFound);
        assert!(second.cached);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn image_is_stored_with_default_content_type() {
        let fetcher = Arc::new(SpyFetcher::image(None, b"\x00avif"));
        let (worker, store, _) = worker(fetcher.clone());

        let headers = AuthHeaders::bearer("tok");
        let reply = worker.resolve(URL, &headers).await;
        let expected = Blob::new("image/avif", b"\x00avif".to_vec());
        assert_eq!(reply.lookup, ImageLookup::Found(expected.clone()));
        assert_eq!(fetcher.seen_headers(), vec![headers]);

        let record = store.get(Namespace::Images, URL).await.unwrap().unwrap();
        assert_eq!(record.payload, CachePayload::Blob(expected.clone()));
        assert_eq!(record.timestamp, NOW);

        let again = worker.resolve(URL, &AuthHeaders::none()).await;
        assert_eq!(again.lookup, ImageLookup::Found(expected));
        assert!(again.cached);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_refetched() {
        let fetcher = Arc::new(SpyFetcher::status(404));
        let (worker, store, clock) = worker(fetcher.clone());
        worker.resolve(URL, &AuthHeaders::none()).await;

        fetcher.respond_with(SpyResponse::Image {
            status: 200,
            content_type: Some("image/png".into()),
            body: vec![1, 2, 3],
        });
        clock.advance(IMAGE_TTL.as_millis() as i64);

        let reply = worker.resolve(URL, &AuthHeaders::none()).await;
        assert_eq!(reply.lookup, ImageLookup::Found(Blob::new("image/png", vec![1u8, 2, 3])));
        assert!(!reply.cached);
        assert_eq!(fetcher.calls(), 2);
        let record = store.get(Namespace::Images, URL).await.unwrap().unwrap();
        assert_eq!(record.timestamp, NOW + IMAGE_TTL.as_millis() as i64);
    }

    #[tokio::test]
    async fn empty_body_and_transport_errors_count_as_not_found() {
        let fetcher = Arc::new(SpyFetcher::image(Some("image/png"), b""));
        let (worker, store, _) = worker(fetcher.clone());
        assert_eq!(worker.resolve(URL, &AuthHeaders::none()).await.lookup, ImageLookup::NotFound);

        fetcher.respond_with(SpyResponse::Fail);
        let other = "http://localhost:8080/api/artists/cover?name=X";
        assert_eq!(worker.resolve(other, &AuthHeaders::none()).await.lookup, ImageLookup::NotFound);
        let record = store.get(Namespace::Images, other).await.unwrap().unwrap();
        assert_eq!(record.payload, CachePayload::NotFound);
    }

    #[tokio::test]
    async fn unavailable_store_falls_through_to_network() {
        let fetcher = Arc::new(SpyFetcher::image(Some("image/jpeg"), b"jpg"));
        let (worker, store, _) = worker(fetcher.clone());
        store.set_available(false);

        let reply = worker.resolve(URL, &AuthHeaders::none()).await;
        assert_eq!(reply.lookup, ImageLookup::Found(Blob::new("image/jpeg", b"jpg".to_vec())));

        store.set_available(true);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn spawned_worker_answers_every_job() {
        let fetcher = Arc::new(SpyFetcher::status(404));
        let (worker, _, _) = worker(fetcher);
        let (jobs, mut replies, handle) = worker.spawn(4);

        for name in ["a", "b", "c"] {
            jobs.send(ImageJob {
                url: format!("{}{}", URL, name),
                headers: AuthHeaders::none(),
            })
            .await
            .unwrap();
        }
        drop(jobs);

        let mut urls = Vec::new();
        while let Some(reply) = replies.recv().await {
            urls.push(reply.url);
        }
        urls.sort();
        assert_eq!(urls, vec![format!("{}a", URL), format!("{}b", URL), format!("{}c", URL)]);
        handle.await.unwrap();
    }
}
