//! Front page scrapers that turn a news homepage into headline records.
//!
//! Every scraper does two things:
//!
//! 1. **Fetching**: download the homepage HTML
//! 2. **Extracting**: pick (title, url) pairs out of the document
//!
//! and exposes both through [`HeadlineSource`], which is all the orchestrator
//! sees.
//!
//! # Supported Sources
//!
//! | Source | Module | Method |
//! |--------|--------|--------|
//! | BBC | [`bbc`] | HTML scraping with selector fallbacks |

pub mod bbc;

use crate::error::ScrapeError;
use crate::models::HeadlineRecord;

/// Anything that can produce the current set of headlines.
pub trait HeadlineSource {
    /// Fetch and extract the current headlines.
    ///
    /// An `Err` means the run must abort without touching the seen-store.
    async fn headlines(&self) -> Result<Vec<HeadlineRecord>, ScrapeError>;
}
