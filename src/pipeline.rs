//! One run: scrape, compare against the seen-store, notify, record.
//!
//! Headlines are recorded only after the digest carrying them is confirmed by
//! the recipients, so a failed delivery leaves them eligible next run
//! (at-least-once). A scrape failure returns before the store is touched or
//! anything is sent, including the one-off first-run message.

use crate::error::RunError;
use crate::models::{HeadlineRecord, RunSummary};
use crate::notify::message::{CONNECTION_TEST_MESSAGE, digest_message};
use crate::notify::{Confirmation, DeliveryReport, Notifier, broadcast};
use crate::scrapers::HeadlineSource;
use crate::store::SeenStore;
use itertools::Itertools;
use tracing::{debug, info, instrument, warn};

/// Store marker set once the connection test message reached someone.
pub const CONNECTION_TEST_MARKER: &str = "connection_test_sent";

/// How novel headlines are packaged and when they count as sent.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub digest_size: usize,
    pub confirm: Confirmation,
    /// Send the connection test message on the first successful run.
    pub announce_first_run: bool,
}

/// Result of comparing a fresh scrape with the store.
#[derive(Debug, Clone, Default)]
pub struct Scan {
    /// Unique records returned by the source.
    pub scraped: usize,
    /// Records not yet in the store, in page order.
    pub novel: Vec<HeadlineRecord>,
}

/// Scrape the source and keep the headlines the store has not seen.
///
/// Never writes to the store.
#[instrument(level = "info", skip_all)]
pub async fn scan<S, St>(source: &S, store: &St) -> Result<Scan, RunError>
where
    S: HeadlineSource,
    St: SeenStore,
{
    let headlines: Vec<HeadlineRecord> = source
        .headlines()
        .await?
        .into_iter()
        .unique_by(|h| h.url.clone())
        .collect();

    let scraped = headlines.len();
    let mut novel = Vec::new();
    for h in headlines {
        if !store.has(&h.url).await? {
            debug!(title = %h.title, url = %h.url, "New headline");
            novel.push(h);
        }
    }

    info!(
        scraped,
        novel = novel.len(),
        known = store.len().await?,
        "Compared with seen-store"
    );
    Ok(Scan { scraped, novel })
}

/// Send `novel` in digests and record each digest's headlines once confirmed.
///
/// Returns `(notified, pending)`. A store write failure aborts immediately;
/// anything not yet recorded is picked up again next run.
#[instrument(level = "info", skip_all, fields(novel = novel.len(), recipients = recipients.len()))]
pub async fn deliver_and_record<St, N>(
    novel: &[HeadlineRecord],
    store: &mut St,
    notifier: &N,
    recipients: &[String],
    opts: RunOptions,
) -> Result<(usize, usize), RunError>
where
    St: SeenStore,
    N: Notifier,
{
    let mut notified = 0usize;
    let mut pending = 0usize;

    for (batch, digest) in novel.chunks(opts.digest_size.max(1)).enumerate() {
        let message = digest_message(digest);
        let report = broadcast(notifier, &message, recipients).await;

        if !report.is_confirmed(opts.confirm) {
            warn!(
                batch,
                headlines = digest.len(),
                delivered = report.delivered.len(),
                failed = report.failed.len(),
                policy = ?opts.confirm,
                "Digest not confirmed; headlines stay pending"
            );
            pending += digest.len();
            continue;
        }

        for record in digest {
            store.add(record).await?;
        }
        notified += digest.len();
        info!(batch, headlines = digest.len(), "Digest delivered and recorded");
    }

    Ok((notified, pending))
}

/// A full run: [`scan`], the first-run message if enabled, then
/// [`deliver_and_record`].
pub async fn run_once<S, St, N>(
    source: &S,
    store: &mut St,
    notifier: &N,
    recipients: &[String],
    opts: RunOptions,
) -> Result<RunSummary, RunError>
where
    S: HeadlineSource,
    St: SeenStore,
    N: Notifier,
{
    let Scan { scraped, novel } = scan(source, store).await?;
    if opts.announce_first_run {
        announce_once(store, notifier, recipients).await?;
    }
    if novel.is_empty() {
        info!(scraped, "Nothing new");
        return Ok(RunSummary {
            scraped,
            ..RunSummary::default()
        });
    }

    let (notified, pending) = deliver_and_record(&novel, store, notifier, recipients, opts).await?;
    Ok(RunSummary {
        scraped,
        novel: novel.len(),
        notified,
        pending,
    })
}

/// Broadcast the connection test message.
pub async fn announce<N: Notifier>(notifier: &N, recipients: &[String]) -> DeliveryReport {
    broadcast(notifier, CONNECTION_TEST_MESSAGE, recipients).await
}

/// Send the connection test message unless the store says it already went out.
///
/// The marker is set once any recipient got the message, so a bad token keeps
/// trying on later runs while a working setup hears it exactly once. Delivery
/// failure is logged, not returned; only a store error aborts.
pub async fn announce_once<St, N>(
    store: &mut St,
    notifier: &N,
    recipients: &[String],
) -> Result<bool, RunError>
where
    St: SeenStore,
    N: Notifier,
{
    if store.has_marker(CONNECTION_TEST_MARKER).await? {
        return Ok(false);
    }

    warn!("First run against this store; sending test notification");
    let report = announce(notifier, recipients).await;
    if !report.is_confirmed(Confirmation::Any) {
        warn!("Test notification reached nobody; check the bot token and chat ids");
        return Ok(false);
    }

    store.set_marker(CONNECTION_TEST_MARKER).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ScrapeError, StoreError};
    use crate::notify::testing::RecordingNotifier;
    use crate::store::SqliteStore;
    use crate::store::memory::MemoryStore;
    use std::cell::RefCell;
    use std::path::PathBuf;

    /// Returns a fixed page, or fails like an unreachable site.
    struct FixedSource {
        page: RefCell<Result<Vec<HeadlineRecord>, ()>>,
    }

    impl FixedSource {
        fn new(items: &[(&str, &str)]) -> Self {
            Self {
                page: RefCell::new(Ok(items
                    .iter()
                    .map(|(t, u)| HeadlineRecord::new(*t, *u))
                    .collect())),
            }
        }

        fn failing() -> Self {
            Self {
                page: RefCell::new(Err(())),
            }
        }

        fn set(&self, items: &[(&str, &str)]) {
            *self.page.borrow_mut() = Ok(items
                .iter()
                .map(|(t, u)| HeadlineRecord::new(*t, *u))
                .collect());
        }
    }

    impl HeadlineSource for FixedSource {
        async fn headlines(&self) -> Result<Vec<HeadlineRecord>, ScrapeError> {
            self.page
                .borrow()
                .clone()
                .map_err(|()| ScrapeError::NoHeadlines {
                    url: "https://www.bbc.com".to_string(),
                })
        }
    }

    /// Reads work, every write fails like a full disk.
    #[derive(Default)]
    struct ReadOnlyStore {
        inner: MemoryStore,
    }

    fn disk_full() -> StoreError {
        StoreError::Io {
            path: PathBuf::from("headlines.db"),
            source: std::io::Error::other("No space left on device"),
        }
    }

    impl SeenStore for ReadOnlyStore {
        async fn has(&self, url: &str) -> Result<bool, StoreError> {
            self.inner.has(url).await
        }

        async fn add(&mut self, _record: &HeadlineRecord) -> Result<bool, StoreError> {
            Err(disk_full())
        }

        async fn len(&self) -> Result<usize, StoreError> {
            self.inner.len().await
        }

        async fn has_marker(&self, key: &str) -> Result<bool, StoreError> {
            self.inner.has_marker(key).await
        }

        async fn set_marker(&mut self, _key: &str) -> Result<(), StoreError> {
            Err(disk_full())
        }
    }

    fn recipients(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn per_item() -> RunOptions {
        RunOptions {
            digest_size: 1,
            confirm: Confirmation::All,
            announce_first_run: false,
        }
    }

    fn count_connection_tests(notifier: &RecordingNotifier) -> usize {
        notifier
            .messages()
            .iter()
            .filter(|m| m.as_str() == CONNECTION_TEST_MESSAGE)
            .count()
    }

    #[tokio::test]
    async fn test_two_run_scenario() {
        let mut store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let to = recipients(&["chat"]);
        let source = FixedSource::new(&[("A", "u1"), ("B", "u2")]);

        let first = run_once(&source, &mut store, &notifier, &to, per_item())
            .await
            .unwrap();
        assert_eq!(first.notified, 2);
        assert!(store.contains("u1") && store.contains("u2"));

        source.set(&[("A", "u1"), ("C", "u3")]);
        let before = notifier.messages().len();
        let second = run_once(&source, &mut store, &notifier, &to, per_item())
            .await
            .unwrap();

        assert_eq!(second, RunSummary { scraped: 2, novel: 1, notified: 1, pending: 0 });
        let new_messages = &notifier.messages()[before..];
        assert_eq!(new_messages.len(), 1);
        assert!(new_messages[0].contains("<b>C</b>"));
        assert!(!new_messages[0].contains("<b>A</b>"));
        assert!(store.contains("u3"));
    }

    #[tokio::test]
    async fn test_known_urls_produce_no_notifications() {
        let mut store = MemoryStore::with_urls(["u1", "u2"]);
        let notifier = RecordingNotifier::default();
        let source = FixedSource::new(&[("A", "u1"), ("B", "u2")]);

        let summary = run_once(&source, &mut store, &notifier, &recipients(&["chat"]), per_item())
            .await
            .unwrap();

        assert_eq!(summary.novel, 0);
        assert_eq!(*notifier.attempts.borrow(), 0);
        assert_eq!(store.additions, 0);
    }

    #[tokio::test]
    async fn test_k_of_n_new_gives_k_notifications_and_k_additions() {
        let mut store = MemoryStore::with_urls(["u1", "u3"]);
        let notifier = RecordingNotifier::default();
        let source = FixedSource::new(&[
            ("A", "u1"),
            ("B", "u2"),
            ("C", "u3"),
            ("D", "u4"),
            ("E", "u5"),
        ]);

        let summary = run_once(&source, &mut store, &notifier, &recipients(&["chat"]), per_item())
            .await
            .unwrap();

        assert_eq!(summary, RunSummary { scraped: 5, novel: 3, notified: 3, pending: 0 });
        assert_eq!(notifier.messages().len(), 3);
        assert_eq!(store.additions, 3);
    }

    #[tokio::test]
    async fn test_total_delivery_failure_records_nothing() {
        let mut store = MemoryStore::new();
        let notifier = RecordingNotifier::failing_for(["1", "2"]);
        let source = FixedSource::new(&[("A", "u1")]);

        let summary = run_once(&source, &mut store, &notifier, &recipients(&["1", "2"]), per_item())
            .await
            .unwrap();

        assert_eq!(summary.pending, 1);
        assert_eq!(summary.notified, 0);
        assert!(!store.contains("u1"));

        // Next run retries the same headline once delivery works again.
        let healthy = RecordingNotifier::default();
        let retry = run_once(&source, &mut store, &healthy, &recipients(&["1", "2"]), per_item())
            .await
            .unwrap();
        assert_eq!(retry.notified, 1);
        assert!(store.contains("u1"));
    }

    #[tokio::test]
    async fn test_partial_failure_depends_on_policy() {
        let to = recipients(&["ok", "broken"]);
        let source = FixedSource::new(&[("A", "u1")]);

        let mut strict = MemoryStore::new();
        run_once(&source, &mut strict, &RecordingNotifier::failing_for(["broken"]), &to, per_item())
            .await
            .unwrap();
        assert!(!strict.contains("u1"));

        let mut lenient = MemoryStore::new();
        let opts = RunOptions {
            confirm: Confirmation::Any,
            ..per_item()
        };
        run_once(&source, &mut lenient, &RecordingNotifier::failing_for(["broken"]), &to, opts)
            .await
            .unwrap();
        assert!(lenient.contains("u1"));
    }

    #[tokio::test]
    async fn test_no_recipients_records_nothing() {
        let mut store = MemoryStore::new();
        let source = FixedSource::new(&[("A", "u1")]);

        let summary = run_once(&source, &mut store, &RecordingNotifier::default(), &[], per_item())
            .await
            .unwrap();

        assert_eq!(summary.pending, 1);
        assert_eq!(store.recorded(), 0);
    }

    #[tokio::test]
    async fn test_scrape_failure_leaves_store_untouched() {
        let mut store = MemoryStore::with_urls(["u0"]);
        let notifier = RecordingNotifier::default();

        let err = run_once(&FixedSource::failing(), &mut store, &notifier, &recipients(&["c"]), per_item())
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Scrape(_)));
        assert_eq!(store.recorded(), 1);
        assert_eq!(store.additions, 0);
        assert_eq!(*notifier.attempts.borrow(), 0);
    }

    #[tokio::test]
    async fn test_store_write_failure_aborts_run() {
        let mut store = ReadOnlyStore::default();
        let notifier = RecordingNotifier::default();
        let source = FixedSource::new(&[("A", "u1"), ("B", "u2")]);

        let err = run_once(&source, &mut store, &notifier, &recipients(&["chat"]), per_item())
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Store(StoreError::Io { .. })));
        assert!(!store.has("u1").await.unwrap());
        // The first digest went out before the write failed; the second never did.
        assert_eq!(notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_digests_group_headlines() {
        let mut store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let items: Vec<(String, String)> = (1..=7)
            .map(|i| (format!("Headline {i}"), format!("u{i}")))
            .collect();
        let refs: Vec<(&str, &str)> = items.iter().map(|(t, u)| (t.as_str(), u.as_str())).collect();
        let source = FixedSource::new(&refs);
        let opts = RunOptions {
            digest_size: 5,
            ..per_item()
        };

        let summary = run_once(&source, &mut store, &notifier, &recipients(&["chat"]), opts)
            .await
            .unwrap();

        let messages = notifier.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("5. <b>Headline 5</b>"));
        assert!(messages[1].contains("1. <b>Headline 6</b>"));
        assert!(messages[1].contains("2. <b>Headline 7</b>"));
        assert_eq!(summary.notified, 7);
        assert_eq!(store.additions, 7);
    }

    #[tokio::test]
    async fn test_duplicate_urls_in_one_page_notify_once() {
        let mut store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let source = FixedSource::new(&[("A", "u1"), ("A again", "u1")]);

        let summary = run_once(&source, &mut store, &notifier, &recipients(&["chat"]), per_item())
            .await
            .unwrap();

        assert_eq!(summary.scraped, 1);
        assert_eq!(notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_notified_url_never_renotified_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("headlines.db");
        let source = FixedSource::new(&[("A", "u1")]);
        let to = recipients(&["chat"]);

        {
            let mut store = SqliteStore::open(&path).await.unwrap();
            let notifier = RecordingNotifier::default();
            run_once(&source, &mut store, &notifier, &to, per_item()).await.unwrap();
            assert_eq!(notifier.messages().len(), 1);
        }

        let mut reopened = SqliteStore::open(&path).await.unwrap();
        let notifier = RecordingNotifier::default();
        let summary = run_once(&source, &mut reopened, &notifier, &to, per_item())
            .await
            .unwrap();
        assert_eq!(summary.novel, 0);
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_scan_does_not_write() {
        let store = MemoryStore::with_urls(["u1"]);
        let source = FixedSource::new(&[("A", "u1"), ("B", "u2")]);

        let scan = scan(&source, &store).await.unwrap();
        assert_eq!(scan.scraped, 2);
        assert_eq!(scan.novel, vec![HeadlineRecord::new("B", "u2")]);
        assert_eq!(store.additions, 0);
    }

    #[tokio::test]
    async fn test_announce_uses_connection_message() {
        let notifier = RecordingNotifier::default();
        let report = announce(&notifier, &recipients(&["1"])).await;
        assert!(report.is_confirmed(Confirmation::All));
        assert_eq!(notifier.messages(), vec![CONNECTION_TEST_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_first_run_message_sent_once_after_successful_scrape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("headlines.db");
        let to = recipients(&["chat"]);
        let opts = RunOptions {
            announce_first_run: true,
            ..per_item()
        };
        let notifier = RecordingNotifier::default();

        // A failed scrape sends nothing, not even the connection test.
        {
            let mut store = SqliteStore::open(&path).await.unwrap();
            let err = run_once(&FixedSource::failing(), &mut store, &notifier, &to, opts)
                .await
                .unwrap_err();
            assert!(matches!(err, RunError::Scrape(_)));
            assert_eq!(*notifier.attempts.borrow(), 0);
        }

        // An empty page still counts as a successful first run.
        let source = FixedSource::new(&[]);
        {
            let mut store = SqliteStore::open(&path).await.unwrap();
            run_once(&source, &mut store, &notifier, &to, opts).await.unwrap();
            assert_eq!(count_connection_tests(&notifier), 1);
            assert_eq!(store.len().await.unwrap(), 0);
        }

        // The store is still empty, but the marker survived the reopen.
        source.set(&[("A", "u1")]);
        let mut store = SqliteStore::open(&path).await.unwrap();
        let summary = run_once(&source, &mut store, &notifier, &to, opts).await.unwrap();
        assert_eq!(summary.notified, 1);
        assert_eq!(count_connection_tests(&notifier), 1);
    }

    #[tokio::test]
    async fn test_unconfirmed_first_run_message_is_retried() {
        let mut store = MemoryStore::new();
        let to = recipients(&["chat"]);

        let broken = RecordingNotifier::failing_for(["chat"]);
        assert!(!announce_once(&mut store, &broken, &to).await.unwrap());
        assert!(!store.has_marker(CONNECTION_TEST_MARKER).await.unwrap());

        let healthy = RecordingNotifier::default();
        assert!(announce_once(&mut store, &healthy, &to).await.unwrap());
        assert!(!announce_once(&mut store, &healthy, &to).await.unwrap());
        assert_eq!(count_connection_tests(&healthy), 1);
    }

    #[tokio::test]
    async fn test_marker_write_failure_aborts_run() {
        let mut store = ReadOnlyStore::default();
        let notifier = RecordingNotifier::default();
        let opts = RunOptions {
            announce_first_run: true,
            ..per_item()
        };

        let err = run_once(&FixedSource::new(&[]), &mut store, &notifier, &recipients(&["c"]), opts)
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Store(_)));
    }
}
