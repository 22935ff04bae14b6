use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info};

use super::{
    blob::{BlobRegistry, ObjectUrl},
    image_worker::{ImageCacheWorker, ImageJob, ImageLookup, WorkerReply},
};
use crate::{error::ImageError, sources::AuthHeaders};

type Waiters = Vec<oneshot::Sender<WorkerReply>>;

/// What a caller gets back for an image request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    /// The caller owns `object_url` and must release it when done.
    Found { object_url: ObjectUrl, cached: bool },
    NotFound { cached: bool },
}

impl ImageOutcome {
    pub fn object_url(&self) -> Option<&ObjectUrl> {
        match self {
            ImageOutcome::Found { object_url, .. } => Some(object_url),
            ImageOutcome::NotFound { .. } => None,
        }
    }
}

/// Front door to the image worker.
///
/// Outstanding requests are tracked per URL. A second request for a URL that
/// is already in flight joins the existing one instead of triggering another
/// fetch, and every waiter receives the result. The entry is removed as soon
/// as the result arrives, so the next request for that URL starts fresh.
pub struct ImageRequestClient {
    jobs: mpsc::Sender<ImageJob>,
    pending: Arc<DashMap<String, Waiters>>,
    blobs: BlobRegistry,
    worker: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

impl ImageRequestClient {
    /// Spawns `worker` and the reply dispatcher. Needs a tokio runtime.
    pub fn start(worker: ImageCacheWorker, blobs: BlobRegistry, capacity: usize) -> Self {
        let (jobs, replies, worker) = worker.spawn(capacity);
        let pending: Arc<DashMap<String, Waiters>> = Arc::new(DashMap::new());
        let dispatcher = tokio::spawn(dispatch(replies, pending.clone()));

        Self {
            jobs,
            pending,
            blobs,
            worker,
            dispatcher,
        }
    }

    pub async fn request(&self, url: &str, headers: AuthHeaders) -> Result<ImageOutcome, ImageError> {
        let (tx, rx) = oneshot::channel();
        let tx = match self.pending.get_mut(url) {
            Some(mut waiting) => {
                waiting.push(tx);
                debug!("🔗 Joined in-flight request for {}", url);
                None
            }
            None => Some(tx),
        };

        if let Some(tx) = tx {
            // Capacity is claimed before the URL is registered, so a caller
            // dropped while waiting for room leaves nothing behind.
            let permit = self.jobs.reserve().await.map_err(|_| ImageError::WorkerStopped)?;
            match self.pending.entry(url.to_string()) {
                Entry::Occupied(mut waiting) => waiting.get_mut().push(tx),
                Entry::Vacant(slot) => {
                    slot.insert(vec![tx]);
                    permit.send(ImageJob {
                        url: url.to_string(),
                        headers,
                    });
                }
            }
        }

        let reply = rx.await.map_err(|_| ImageError::WorkerStopped)?;
        Ok(match reply.lookup {
            ImageLookup::Found(blob) => ImageOutcome::Found {
                object_url: self.blobs.create(blob),
                cached: reply.cached,
            },
            ImageLookup::NotFound => ImageOutcome::NotFound {
                cached: reply.cached,
            },
        })
    }

    /// Releases an object URL handed out by [`request`](Self::request).
    pub fn release(&self, object_url: &ObjectUrl) -> bool {
        self.blobs.revoke(object_url)
    }

    pub fn blobs(&self) -> &BlobRegistry {
        &self.blobs
    }

    /// Callers currently waiting on `url`.
    pub fn waiting_on(&self, url: &str) -> usize {
        self.pending.get(url).map(|w| w.len()).unwrap_or(0)
    }

    pub fn pending_urls(&self) -> usize {
        self.pending.len()
    }

    /// Stops accepting requests and waits for in-flight fetches to land.
    pub async fn shutdown(self) {
        drop(self.jobs);
        let _ = self.worker.await;
        let _ = self.dispatcher.await;
        info!("🖼️ Image client shut down");
    }
}

async fn dispatch(mut replies: mpsc::UnboundedReceiver<WorkerReply>, pending: Arc<DashMap<String, Waiters>>) {
    while let Some(reply) = replies.recv().await {
        let Some((_, waiters)) = pending.remove(&reply.url) else {
            debug!("No one waiting for {}", reply.url);
            continue;
        };
        for waiter in waiters {
            let _ = waiter.send(reply.clone());
        }
    }
    // Worker is gone: dropping the senders fails every remaining waiter.
    pending.clear();
}
