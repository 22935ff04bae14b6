//! Resource cache and playback queue core of the Muse streaming client.
//!
//! - [`storage`]: durable namespaced key-value records
//! - [`cache`]: metadata cache-aside layer and the cover-art worker
//! - [`audio`]: playback queue state machine and command handling
//! - [`library`]: cache-first browsing on top of the Muse API
//! - [`sources`]: HTTP client for the Muse API

pub mod audio;
pub mod cache;
pub mod config;
pub mod error;
pub mod library;
pub mod runtime;
pub mod sources;
pub mod storage;

pub use config::Config;
pub use error::{FetchError, ImageError, LibraryError, StoreError};
