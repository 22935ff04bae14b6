use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use super::{AuthHeaders, FetchedImage, ImageFetcher, SongSummary};
use crate::{cache::EntityKind, error::FetchError};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Total {
    total: u64,
}

#[derive(Debug, Deserialize)]
struct NamedSong {
    name: String,
}

/// Client for the Muse REST API.
#[derive(Debug, Clone)]
pub struct MuseApi {
    base: Url,
    token: Option<String>,
    client: reqwest::Client,
}

impl MuseApi {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            base: Url::parse(base_url)?,
            token,
            client,
        })
    }

    pub fn auth_headers(&self) -> AuthHeaders {
        match &self.token {
            Some(token) => AuthHeaders::bearer(token),
            None => AuthHeaders::none(),
        }
    }

    /// Raw `data` array of one list page, stored as-is in the metadata cache.
    pub async fn list(&self, kind: EntityKind, start: usize, end: usize) -> Result<Value, FetchError> {
        let url = self.endpoint(
            &format!("/api/{}", kind.as_str()),
            &[
                ("index_start", &start.to_string()),
                ("index_end", &end.to_string()),
            ],
        )?;
        let data: Option<Value> = self.get_data(url).await?;
        Ok(data.unwrap_or_else(|| Value::Array(Vec::new())))
    }

    pub async fn total(&self, kind: EntityKind) -> Result<u64, FetchError> {
        let url = self.endpoint(&format!("/api/{}/total", kind.as_str()), &[])?;
        let total: Option<Total> = self.get_data(url).await?;
        total
            .map(|t| t.total)
            .ok_or_else(|| FetchError::Decode(format!("{} total missing", kind.as_str())))
    }

    pub async fn search_songs(&self, query: &str) -> Result<Vec<SongSummary>, FetchError> {
        let url = self.endpoint("/api/songs/search", &[("query", query)])?;
        let songs: Option<Vec<SongSummary>> = self.get_data(url).await?;
        Ok(songs.unwrap_or_default())
    }

    pub async fn artist_songs(&self, artist: &str) -> Result<Vec<SongSummary>, FetchError> {
        let url = self.endpoint("/api/artists/songs", &[("name", artist)])?;
        let songs: Option<Vec<NamedSong>> = self.get_data(url).await?;
        Ok(songs
            .unwrap_or_default()
            .into_iter()
            .map(|song| SongSummary {
                name: song.name,
                artist_name: artist.to_string(),
            })
            .collect())
    }

    pub fn song_cover_url(&self, name: &str, artist: &str) -> Result<String, FetchError> {
        self.endpoint("/api/songs/cover", &[("name", name), ("artist_name", artist)])
            .map(String::from)
    }

    pub fn artist_cover_url(&self, name: &str) -> Result<String, FetchError> {
        self.endpoint("/api/artists/cover", &[("name", name)])
            .map(String::from)
    }

    pub fn stream_url(&self, name: &str, artist: &str, format: &str) -> Result<String, FetchError> {
        self.endpoint(
            "/api/stream",
            &[("artist_name", artist), ("song_name", name), ("format", format)],
        )
        .map(String::from)
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, FetchError> {
        let mut url = self.base.join(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().copied());
        }
        Ok(url)
    }

    fn request(&self, url: &str, headers: &AuthHeaders) -> reqwest::RequestBuilder {
        headers
            .iter()
            .fold(self.client.get(url), |req, (name, value)| req.header(name, value))
    }

    async fn get_data<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, FetchError> {
        debug!("🌐 GET {}", url);
        let response = self
            .request(url.as_str(), &self.auth_headers())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("❌ Muse API error: {} for {}", status, url);
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl ImageFetcher for MuseApi {
    async fn fetch_image(&self, url: &str, headers: &AuthHeaders) -> Result<FetchedImage, FetchError> {
        let response = self.request(url, headers).send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        Ok(FetchedImage {
            status,
            content_type,
            body,
        })
    }
}
