//! Cache-first browsing of songs and artists.
//!
//! Pages and totals are read from the [`MetadataCache`] and fetched from the
//! API only on a miss. Cover art goes through the [`ImageRequestClient`];
//! anything that fails to produce an image degrades to the placeholder.

use futures::future::join_all;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    audio::QueueEntry,
    cache::{EntityKind, ImageOutcome, ImageRequestClient, MetadataCache, ObjectUrl},
    error::{FetchError, LibraryError},
    sources::{ArtistSummary, MuseApi, SongSummary},
};

/// Asset shown when a cover is missing.
pub const PLACEHOLDER_COVER: &str = "place_holder.webp";

/// Items per browse page.
pub const DEFAULT_PAGE_SIZE: usize = 36;

/// Cover art for display. `Image` handles must be released after use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cover {
    Image(ObjectUrl),
    Placeholder,
}

impl Cover {
    /// Source to hand to an image element.
    pub fn src(&self) -> &str {
        match self {
            Cover::Image(url) => url.as_str(),
            Cover::Placeholder => PLACEHOLDER_COVER,
        }
    }
}

pub struct Library {
    api: MuseApi,
    metadata: Arc<MetadataCache>,
    images: Arc<ImageRequestClient>,
    page_size: usize,
}

impl Library {
    pub fn new(
        api: MuseApi,
        metadata: Arc<MetadataCache>,
        images: Arc<ImageRequestClient>,
        page_size: usize,
    ) -> Self {
        Self {
            api,
            metadata,
            images,
            page_size,
        }
    }

    /// `[start, end)` of the zero-based `page`.
    pub fn page_span(&self, page: usize) -> (usize, usize) {
        let start = page * self.page_size;
        (start, start + self.page_size)
    }

    pub async fn songs_page(&self, start: usize, end: usize) -> Result<Vec<SongSummary>, LibraryError> {
        self.page(EntityKind::Songs, start, end).await
    }

    pub async fn artists_page(&self, start: usize, end: usize) -> Result<Vec<ArtistSummary>, LibraryError> {
        self.page(EntityKind::Artists, start, end).await
    }

    pub async fn total(&self, kind: EntityKind) -> Result<u64, LibraryError> {
        if let Some(total) = self.metadata.get_total(kind).await {
            return Ok(total);
        }
        let total = self.api.total(kind).await?;
        self.metadata.set_total(kind, total).await;
        Ok(total)
    }

    /// Uncached fuzzy search.
    pub async fn search_songs(&self, query: &str) -> Result<Vec<SongSummary>, LibraryError> {
        Ok(self.api.search_songs(query).await?)
    }

    pub async fn artist_songs(&self, artist: &str) -> Result<Vec<SongSummary>, LibraryError> {
        Ok(self.api.artist_songs(artist).await?)
    }

    /// Stream location for a queued track, in `format` (e.g. `mp3`).
    pub fn stream_url(&self, entry: &QueueEntry, format: &str) -> Result<String, LibraryError> {
        Ok(self
            .api
            .stream_url(&entry.track_name, &entry.artist_name, format)?)
    }

    pub async fn song_cover(&self, song: &SongSummary) -> Cover {
        self.cover(self.api.song_cover_url(&song.name, &song.artist_name))
            .await
    }

    pub async fn artist_cover(&self, artist: &ArtistSummary) -> Cover {
        self.cover(self.api.artist_cover_url(&artist.name)).await
    }

    /// Requests every cover concurrently, in input order.
    pub async fn preload_covers(&self, songs: &[SongSummary]) -> Vec<Cover> {
        join_all(songs.iter().map(|song| self.song_cover(song))).await
    }

    pub fn release_cover(&self, cover: &Cover) {
        if let Cover::Image(url) = cover {
            self.images.release(url);
        }
    }

    async fn page<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
        start: usize,
        end: usize,
    ) -> Result<Vec<T>, LibraryError> {
        let key = kind.page_key(start, end);
        if let Some(cached) = self.metadata.get_entity(kind, &key).await {
            match serde_json::from_value(cached) {
                Ok(items) => return Ok(items),
                Err(e) => warn!("Cached {} does not decode, refetching: {}", key, e),
            }
        }

        let data = self.api.list(kind, start, end).await?;
        let items = serde_json::from_value(data.clone())?;
        self.metadata.set_entity(kind, &key, data).await;
        Ok(items)
    }

    async fn cover(&self, url: Result<String, FetchError>) -> Cover {
        let url = match url {
            Ok(url) => url,
            Err(e) => {
                warn!("Bad cover URL: {}", e);
                return Cover::Placeholder;
            }
        };

        match self.images.request(&url, self.api.auth_headers()).await {
            Ok(ImageOutcome::Found { object_url, .. }) => Cover::Image(object_url),
            Ok(ImageOutcome::NotFound { .. }) => Cover::Placeholder,
            Err(e) => {
                debug!("Cover request for {} failed: {}", url, e);
                Cover::Placeholder
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::{
            test_support::{SpyFetcher, SpyResponse},
            BlobRegistry, ImageCacheWorker, IMAGE_TTL, METADATA_TTL,
        },
        runtime::{ManualClock, OnlineFlag},
        sources::AuthHeaders,
        storage::MemoryStore,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    // Nothing listens here, so any request that reaches the network fails.
    const DEAD_SERVER: &str = "http://127.0.0.1:9";

    fn library(fetcher: Arc<SpyFetcher>) -> (Library, Arc<MetadataCache>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let metadata = Arc::new(MetadataCache::new(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            Arc::new(OnlineFlag::new(true)),
            METADATA_TTL,
        ));
        let worker = ImageCacheWorker::new(Arc::new(MemoryStore::new()), fetcher, clock, IMAGE_TTL);
        let images = Arc::new(ImageRequestClient::start(worker, BlobRegistry::new(), 8));
        let api = MuseApi::new(DEAD_SERVER, Some("tok".into())).unwrap();
        (
            Library::new(api, metadata.clone(), images, DEFAULT_PAGE_SIZE),
            metadata,
        )
    }

    #[tokio::test]
    async fn cached_page_is_served_without_network() {
        let (library, metadata) = library(Arc::new(SpyFetcher::status(404)));
        metadata
            .set_entity(
                EntityKind::Songs,
                "songs_0_36",
                json!([{"name": "A", "artist_name": "X"}]),
            )
            .await;
        metadata.set_total(EntityKind::Songs, 1).await;

        let (start, end) = library.page_span(0);
        let songs = library.songs_page(start, end).await.unwrap();
        assert_eq!(
            songs,
            vec![SongSummary {
                name: "A".into(),
                artist_name: "X".into()
            }]
        );
        assert_eq!(library.total(EntityKind::Songs).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn miss_surfaces_network_failure() {
        let (library, _) = library(Arc::new(SpyFetcher::status(404)));
        let err = library.artists_page(36, 72).await.unwrap_err();
        assert!(matches!(err, LibraryError::Network(_)));
    }

    #[tokio::test]
    async fn covers_resolve_to_images_or_placeholder() {
        let fetcher = Arc::new(SpyFetcher::image(Some("image/webp"), b"webp"));
        let (library, _) = library(fetcher.clone());
        let songs = vec![
            SongSummary {
                name: "A".into(),
                artist_name: "X".into(),
            },
            SongSummary {
                name: "B".into(),
                artist_name: "Y".into(),
            },
        ];

        let covers = library.preload_covers(&songs).await;
        assert_eq!(covers.len(), 2);
        assert!(covers.iter().all(|c| matches!(c, Cover::Image(_))));
        assert!(covers[0].src().starts_with("blob:"));
        assert_eq!(fetcher.seen_headers()[0], AuthHeaders::bearer("tok"));
        for cover in &covers {
            library.release_cover(cover);
        }

        fetcher.respond_with(SpyResponse::Fail);
        let artist = ArtistSummary { name: "Z".into() };
        let cover = library.artist_cover(&artist).await;
        assert_eq!(cover, Cover::Placeholder);
        assert_eq!(cover.src(), PLACEHOLDER_COVER);
    }

    #[tokio::test]
    async fn page_spans_are_contiguous() {
        let (library, _) = library(Arc::new(SpyFetcher::status(404)));
        assert_eq!(library.page_span(0), (0, 36));
        assert_eq!(library.page_span(2), (72, 108));
    }

    #[tokio::test]
    async fn stream_url_names_artist_then_song() {
        let (library, _) = library(Arc::new(SpyFetcher::status(404)));
        let url = library
            .stream_url(&QueueEntry::new("Ceremony", "New Order"), "mp3")
            .unwrap();
        assert_eq!(
            url,
            format!("{}/api/stream?artist_name=New+Order&song_name=Ceremony&format=mp3", DEAD_SERVER)
        );
    }
}
