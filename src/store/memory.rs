//! In-memory seen-store for orchestrator tests.

use super::SeenStore;
use crate::error::StoreError;
use crate::models::HeadlineRecord;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct MemoryStore {
    seen: HashSet<String>,
    markers: HashSet<String>,
    /// Number of successful new insertions, for asserting "exactly K additions".
    pub additions: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            seen: urls.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Synchronous lookup for assertions.
    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn recorded(&self) -> usize {
        self.seen.len()
    }
}

impl SeenStore for MemoryStore {
    async fn has(&self, url: &str) -> Result<bool, StoreError> {
        Ok(self.seen.contains(url))
    }

    async fn add(&mut self, record: &HeadlineRecord) -> Result<bool, StoreError> {
        let inserted = self.seen.insert(record.url.clone());
        if inserted {
            self.additions += 1;
        }
        Ok(inserted)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.seen.len())
    }

    async fn has_marker(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.markers.contains(key))
    }

    async fn set_marker(&mut self, key: &str) -> Result<(), StoreError> {
        self.markers.insert(key.to_string());
        Ok(())
    }
}
