//! Data models shared by the scraper, the seen-store and the notifier.
//!
//! - [`HeadlineRecord`]: one scraped (title, url) pair
//! - [`SeenEntry`]: what the store remembers about a url it has recorded
//! - [`RunSummary`]: counters describing a single orchestrator run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A headline as scraped from the front page.
///
/// The `url` is the identity used for deduplication; two records with the same
/// url are the same article even if the title was edited between runs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HeadlineRecord {
    /// The visible headline text.
    pub title: String,
    /// Absolute article URL.
    pub url: String,
}

impl HeadlineRecord {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Row stored per url in the seen-store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, FromRow)]
pub struct SeenEntry {
    /// Title at the time the url was first recorded. Informational only.
    pub title: String,
    /// When the url was first recorded.
    pub first_seen: DateTime<Utc>,
}

impl SeenEntry {
    pub fn now(title: &str) -> Self {
        Self {
            title: title.to_string(),
            first_seen: Utc::now(),
        }
    }
}

/// Outcome counters of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records returned by the extractor (after in-page url dedup).
    pub scraped: usize,
    /// Records not yet present in the store.
    pub novel: usize,
    /// Novel records whose digest was confirmed and which are now recorded.
    pub notified: usize,
    /// Novel records left unrecorded; they will be retried next run.
    pub pending: usize,
}
