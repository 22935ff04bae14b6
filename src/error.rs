//! Error taxonomy shared by the cache, network and library layers.

/// Failure of the persistent store. Callers degrade to a cache miss.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("corrupt record for key {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Failure talking to the music server.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered {status} for {url}")]
    Status { status: u16, url: String },
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl FetchError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, FetchError::Status { status: 401, .. })
    }
}

/// Failure of a user-facing metadata operation.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    /// The bearer token was rejected; the auth layer decides what happens next.
    #[error("not authorized")]
    Unauthorized,
    #[error(transparent)]
    Network(FetchError),
    #[error("unexpected payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<FetchError> for LibraryError {
    fn from(err: FetchError) -> Self {
        if err.is_unauthorized() {
            LibraryError::Unauthorized
        } else {
            LibraryError::Network(err)
        }
    }
}

/// Failure of the image request channel itself (not of the image fetch).
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image worker stopped")]
    WorkerStopped,
}
