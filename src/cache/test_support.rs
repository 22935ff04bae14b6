use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::Semaphore;

use crate::{
    error::FetchError,
    sources::{AuthHeaders, FetchedImage, ImageFetcher},
};

#[derive(Debug, Clone)]
pub(crate) enum SpyResponse {
    Image {
        status: u16,
        content_type: Option<String>,
        body: Vec<u8>,
    },
    Fail,
}

/// Counts calls and answers with a canned response. Optionally waits on a
/// gate so tests can line up concurrent requests first.
pub(crate) struct SpyFetcher {
    calls: AtomicUsize,
    response: Mutex<SpyResponse>,
    seen_headers: Mutex<Vec<AuthHeaders>>,
    gate: Arc<Semaphore>,
}

impl SpyFetcher {
    pub(crate) fn new(response: SpyResponse) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            response: Mutex::new(response),
            seen_headers: Mutex::new(Vec::new()),
            gate: Arc::new(Semaphore::new(Semaphore::MAX_PERMITS)),
        }
    }

    pub(crate) fn image(content_type: Option<&str>, body: &[u8]) -> Self {
        Self::new(SpyResponse::Image {
            status: 200,
            content_type: content_type.map(str::to_string),
            body: body.to_vec(),
        })
    }

    pub(crate) fn status(status: u16) -> Self {
        Self::new(SpyResponse::Image {
            status,
            content_type: None,
            body: Vec::new(),
        })
    }

    /// Closed gate: every fetch blocks until `open_gate` is called.
    pub(crate) fn gated(mut self) -> Self {
        self.gate = Arc::new(Semaphore::new(0));
        self
    }

    pub(crate) fn open_gate(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    pub(crate) fn respond_with(&self, response: SpyResponse) {
        *self.response.lock() = response;
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn seen_headers(&self) -> Vec<AuthHeaders> {
        self.seen_headers.lock().clone()
    }
}

#[async_trait]
impl ImageFetcher for SpyFetcher {
    async fn fetch_image(&self, _url: &str, headers: &AuthHeaders) -> Result<FetchedImage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_headers.lock().push(headers.clone());
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        let response = self.response.lock().clone();
        match response {
            SpyResponse::Image {
                status,
                content_type,
                body,
            } => Ok(FetchedImage {
                status,
                content_type,
                body: Bytes::from(body),
            }),
            SpyResponse::Fail => Err(FetchError::Decode("connection reset".into())),
        }
    }
}
