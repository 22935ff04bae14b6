//! # Sources Module
//!
//! Network collaborators of the cache core: the Muse REST API and the raw
//! image fetch used by the cover-art worker.

pub mod muse_api;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
pub use muse_api::MuseApi;

/// Content type assumed when the server omits one.
pub const DEFAULT_IMAGE_TYPE: &str = "image/avif";

/// Headers attached to every request, normally just the bearer token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthHeaders(Vec<(String, String)>);

impl AuthHeaders {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn bearer(token: &str) -> Self {
        Self(vec![("Authorization".to_string(), format!("Bearer {}", token))])
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.push((name.into(), value.into()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Raw answer of an image endpoint. Non-2xx statuses are data here, the
/// worker decides what they mean.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FetchedImage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetches image bytes. `Err` only for transport-level failures.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_image(&self, url: &str, headers: &AuthHeaders) -> Result<FetchedImage, FetchError>;
}

/// Song row as returned by list and search endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongSummary {
    pub name: String,
    pub artist_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistSummary {
    pub name: String,
}
