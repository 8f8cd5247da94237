//! BBC front page scraper.
//!
//! The BBC homepage markup changes often, so extraction walks an ordered list
//! of selectors and keeps the first one that yields anything. Links are
//! filtered to plausible headlines (10 to 150 characters), root-relative hrefs
//! are resolved against the homepage, and the result is capped at 20 unique
//! urls.

use super::HeadlineSource;
use crate::error::ScrapeError;
use crate::models::HeadlineRecord;
use crate::utils::{collapse_whitespace, truncate_for_log};
use itertools::Itertools;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const DEFAULT_SOURCE_URL: &str = "https://www.bbc.com";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const MIN_TITLE_CHARS: usize = 10;
const MAX_TITLE_CHARS: usize = 150;
pub const MAX_HEADLINES: usize = 20;

/// Tried in order; the first selector producing any headline wins.
const HEADLINE_SELECTORS: [&str; 4] = [
    r#"a[data-testid="internal-link"]"#,
    "a.bbc-1f5kfds",
    "a.gs-c-promo-heading",
    "a.ssrcss-1mrs5ns-PromoLink",
];

static SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    HEADLINE_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});

/// Scraper for the BBC homepage.
#[derive(Debug, Clone)]
pub struct BbcFrontPage {
    client: Client,
    source_url: Url,
    max_headlines: usize,
}

impl BbcFrontPage {
    /// Build a scraper for `source_url` whose requests give up after `timeout`.
    pub fn new(source_url: &str, timeout: Duration) -> Result<Self, ScrapeError> {
        let parsed = Url::parse(source_url).map_err(|source| ScrapeError::InvalidUrl {
            url: source_url.to_string(),
            source,
        })?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|source| ScrapeError::Fetch {
                url: source_url.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            source_url: parsed,
            max_headlines: MAX_HEADLINES,
        })
    }

    /// Download the homepage HTML.
    #[instrument(level = "info", skip_all, fields(url = %self.source_url))]
    async fn fetch_page(&self) -> Result<String, ScrapeError> {
        let url = self.source_url.to_string();
        let fetch_err = |source| ScrapeError::Fetch {
            url: url.clone(),
            source,
        };

        let response = self
            .client
            .get(self.source_url.clone())
            .send()
            .await
            .map_err(fetch_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(fetch_err)?;
        info!(bytes = body.len(), "Fetched front page");
        Ok(body)
    }
}

impl HeadlineSource for BbcFrontPage {
    #[instrument(level = "info", skip_all, fields(url = %self.source_url))]
    async fn headlines(&self) -> Result<Vec<HeadlineRecord>, ScrapeError> {
        let html = self.fetch_page().await?;
        let headlines = extract_headlines(&html, &self.source_url, self.max_headlines);

        if headlines.is_empty() {
            warn!(
                body_preview = %truncate_for_log(&html, 200),
                "No selector matched any headline"
            );
            return Err(ScrapeError::NoHeadlines {
                url: self.source_url.to_string(),
            });
        }

        info!(count = headlines.len(), "Extracted BBC headlines");
        Ok(headlines)
    }
}

/// Extract up to `limit` unique headlines from a BBC homepage document.
pub fn extract_headlines(html: &str, base: &Url, limit: usize) -> Vec<HeadlineRecord> {
    let document = Html::parse_document(html);

    for (selector, raw) in SELECTORS.iter().zip(HEADLINE_SELECTORS) {
        let headlines: Vec<HeadlineRecord> = document
            .select(selector)
            .filter_map(|a| {
                let title = collapse_whitespace(&a.text().collect::<Vec<_>>().join(" "));
                let len = title.chars().count();
                if !(MIN_TITLE_CHARS..=MAX_TITLE_CHARS).contains(&len) {
                    return None;
                }
                let url = resolve_href(base, a.value().attr("href")?)?;
                Some(HeadlineRecord::new(title, url))
            })
            .unique_by(|h| h.url.clone())
            .take(limit)
            .collect();

        if !headlines.is_empty() {
            debug!(selector = raw, count = headlines.len(), "Selector matched");
            return headlines;
        }
        debug!(selector = raw, "Selector matched nothing; trying next");
    }

    Vec::new()
}

/// Turn an `href` into an absolute article url, or `None` if it is not one.
fn resolve_href(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.starts_with('/') {
        base.join(href).ok().map(String::from)
    } else if href.starts_with("http://") || href.starts_with("https://") {
        Some(href.to_string())
    } else {
        None
    }
}
