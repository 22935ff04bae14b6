use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::{
    audio::DEFAULT_HISTORY,
    cache::{IMAGE_TTL, METADATA_TTL},
    library::DEFAULT_PAGE_SIZE,
};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // API
    pub api_url: String,
    pub auth_token: Option<String>,

    // Almacenamiento
    pub data_dir: PathBuf,
    pub metadata_ttl: Duration,
    pub image_ttl: Duration,

    // Navegación y reproducción
    pub page_size: usize,
    pub history_limit: usize,
    pub stream_format: String,

    // Rendimiento
    pub image_worker_queue: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            api_url: std::env::var("MUSE_API_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            auth_token: std::env::var("MUSE_AUTH_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),

            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),
            metadata_ttl: duration_var("METADATA_TTL", METADATA_TTL)?,
            image_ttl: duration_var("IMAGE_TTL", IMAGE_TTL)?,

            page_size: std::env::var("PAGE_SIZE")
                .unwrap_or_else(|_| DEFAULT_PAGE_SIZE.to_string())
                .parse()
                .context("PAGE_SIZE")?,
            history_limit: std::env::var("HISTORY_LIMIT")
                .unwrap_or_else(|_| DEFAULT_HISTORY.to_string())
                .parse()
                .context("HISTORY_LIMIT")?,
            stream_format: std::env::var("STREAM_FORMAT").unwrap_or_else(|_| "mp3".to_string()),

            image_worker_queue: std::env::var("IMAGE_WORKER_QUEUE")
                .unwrap_or_else(|_| "256".to_string())
                .parse()
                .context("IMAGE_WORKER_QUEUE")?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Sanity checks on values that would otherwise fail much later.
    ///
    /// - TTLs must be non-zero
    /// - Page size and worker queue capacity must be > 0
    /// - The API URL must parse
    pub fn validate(&self) -> Result<()> {
        if self.metadata_ttl.is_zero() || self.image_ttl.is_zero() {
            anyhow::bail!("Cache TTLs must be greater than 0");
        }

        if self.page_size == 0 {
            anyhow::bail!("Page size must be greater than 0");
        }

        if self.image_worker_queue == 0 {
            anyhow::bail!("Image worker queue must be greater than 0");
        }

        url::Url::parse(&self.api_url)
            .with_context(|| format!("Invalid MUSE_API_URL: {}", self.api_url))?;

        Ok(())
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.data_dir.join("meta")
    }

    pub fn image_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }

    /// Loggable summary; never includes the token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            API: {} (token: {})\n  \
            Storage: {} (metadata TTL {}, image TTL {})\n  \
            Browsing: {} per page, {} tracks of history, {} streams",
            self.api_url,
            if self.auth_token.is_some() { "set" } else { "none" },
            self.data_dir.display(),
            humantime::format_duration(self.metadata_ttl),
            humantime::format_duration(self.image_ttl),
            self.page_size,
            self.history_limit,
            self.stream_format,
        )
    }
}

fn duration_var(name: &str, default: Duration) -> Result<Duration> {
    match std::env::var(name) {
        Ok(val) if !val.trim().is_empty() => humantime::parse_duration(val.trim())
            .with_context(|| format!("{} is not a duration: {}", name, val)),
        _ => Ok(default),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            auth_token: None,

            data_dir: "./data".into(),
            metadata_ttl: METADATA_TTL,
            image_ttl: IMAGE_TTL,

            page_size: DEFAULT_PAGE_SIZE,
            history_limit: DEFAULT_HISTORY,
            stream_format: "mp3".to_string(),

            image_worker_queue: 256,
        }
    }
}
