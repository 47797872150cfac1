/// Error types shared across the crate
///
/// Preload failures never escape the controller's public methods; they are
/// logged and counted. `PreloadError` is the typed channel the executor and
/// batcher use internally.
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type PreloadResult<T> = Result<T, PreloadError>;

/// Why a single image (or a whole batch) did not preload
#[derive(Debug, Error)]
pub enum PreloadError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {status_code} for {url}")]
    Status { url: String, status_code: u16 },

    #[error("invalid image URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("preload session aborted")]
    Aborted,

    #[error("preload task failed: {0}")]
    Task(String),
}

impl PreloadError {
    /// Superseded sessions are expected control flow, not failures
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Errors raised while loading a `SiteConfig`
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}
