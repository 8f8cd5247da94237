//! Typed errors for each stage of a run.
//!
//! Scrape and store errors abort the run and make the process exit non-zero.
//! Notify errors are per recipient and only decide whether a digest counts as
//! delivered.

use std::path::PathBuf;
use thiserror::Error;

/// Fetching or parsing the front page failed.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Network failure, timeout, or unreadable body.
    #[error("fetch failed for {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status.
    #[error("fetch of {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The configured source URL is unusable.
    #[error("invalid source url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The page parsed but none of the known headline selectors matched.
    #[error("no headlines found on {url} (unexpected page structure)")]
    NoHeadlines { url: String },
}

/// Reading or writing the seen-store failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Opening, migrating, querying or writing the database failed. A file
    /// that is not a valid database lands here and is never silently reset.
    #[error("seen-store database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Delivering one message to one recipient failed.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("request to {recipient} failed: {source}")]
    Request {
        recipient: String,
        #[source]
        source: reqwest::Error,
    },

    /// The messaging API refused the message.
    #[error("{recipient} rejected with HTTP {status}: {body}")]
    Rejected {
        recipient: String,
        status: u16,
        body: String,
    },
}

/// Loading the optional YAML config file failed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// A run aborted before completing.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
