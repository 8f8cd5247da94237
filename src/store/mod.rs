//! The seen-store: a durable, monotonically growing set of headline urls.
//!
//! The orchestrator only needs existence checks and idempotent inserts, plus a
//! few named markers for one-off events such as the first-run message. Urls
//! are never removed.
//!
//! | Store | Module | Backing |
//! |-------|--------|---------|
//! | [`SqliteStore`] | [`sqlite`] | SQLite file, `headlines` and `markers` tables |
//! | `MemoryStore` | `memory` | `HashSet`, test-only |

#[cfg(test)]
pub mod memory;
pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::StoreError;
use crate::models::HeadlineRecord;

/// Durable set of previously notified headline urls.
pub trait SeenStore {
    /// Whether `url` has already been recorded.
    async fn has(&self, url: &str) -> Result<bool, StoreError>;

    /// Record `record.url` as seen.
    ///
    /// Returns `Ok(true)` when the url was newly inserted and `Ok(false)` when
    /// it was already present (no-op). Once this returns `Ok`, the insertion
    /// survives a crash.
    async fn add(&mut self, record: &HeadlineRecord) -> Result<bool, StoreError>;

    /// Number of recorded urls.
    async fn len(&self) -> Result<usize, StoreError>;

    /// Whether the marker `key` has been set.
    async fn has_marker(&self, key: &str) -> Result<bool, StoreError>;

    /// Durably set the marker `key`. Setting it twice is a no-op.
    async fn set_marker(&mut self, key: &str) -> Result<(), StoreError>;
}
