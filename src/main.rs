//! # Headline Notifier
//!
//! Scrapes the BBC front page, remembers which headlines have already been
//! sent, and pushes new ones to Telegram chats.
//!
//! ## Usage
//!
//! ```sh
//! # credentials in .env or the environment
//! TELEGRAM_TOKEN=123:ABC TELEGRAM_CHAT_IDS=111,222 headline_notifier
//! ```
//!
//! Meant to be run by cron or a similar scheduler: each invocation does one
//! pass and exits. Exit status is non-zero when the page cannot be fetched or
//! parsed, or the store cannot be read or written.
//!
//! ## Architecture
//!
//! 1. **Scraping**: fetch the front page and extract (title, url) pairs
//! 2. **Dedup**: drop urls already in the seen-store
//! 3. **Notify**: send the rest in digests to every chat, retrying per chat
//! 4. **Record**: add a digest's urls to the store once its delivery is confirmed

use clap::Parser;
use std::error::Error;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod models;
mod notify;
mod pipeline;
mod scrapers;
mod store;
mod utils;

use cli::Cli;
use config::Settings;
use models::RunSummary;
use notify::{Confirmation, RetryNotifier, TelegramNotifier};
use pipeline::{RunOptions, announce, run_once, scan};
use scrapers::bbc::BbcFrontPage;
use store::{SeenStore, SqliteStore};

/// First backoff delay between delivery attempts to one chat.
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    // .env first so it can also carry RUST_LOG
    let dotenv = dotenvy::dotenv();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "Ignoring unreadable .env"),
    }

    let start_time = Instant::now();
    info!("headline_notifier starting up");

    let args = Cli::parse();
    let settings = match Settings::resolve(&args) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    debug!(?settings, "Resolved settings");

    let result = if settings.test_notification {
        send_test_notification(&settings).await.map(|_| None)
    } else {
        run(&settings).await.map(Some)
    };

    let elapsed = start_time.elapsed();
    match result {
        Ok(summary) => {
            let summary = summary.unwrap_or_default();
            info!(
                ?elapsed,
                scraped = summary.scraped,
                novel = summary.novel,
                notified = summary.notified,
                pending = summary.pending,
                "Execution complete"
            );
            Ok(())
        }
        Err(e) => {
            error!(?elapsed, error = %e, "Run aborted");
            Err(e)
        }
    }
}

fn build_notifier(
    settings: &Settings,
) -> Result<Option<RetryNotifier<TelegramNotifier>>, Box<dyn Error>> {
    if !settings.notifications_enabled() {
        return Ok(None);
    }
    let Some(token) = settings.token.as_deref() else {
        return Ok(None);
    };
    let transport = TelegramNotifier::new(token, &settings.api_base, settings.timeout)?;
    Ok(Some(RetryNotifier::new(
        transport,
        settings.max_retries,
        RETRY_BASE_DELAY,
    )))
}

/// One scheduled pass: scrape, dedup, notify, record.
#[instrument(level = "info", skip_all, fields(db = %settings.db_path.display()))]
async fn run(settings: &Settings) -> Result<RunSummary, Box<dyn Error>> {
    let mut store = SqliteStore::open(&settings.db_path).await?;
    let source = BbcFrontPage::new(&settings.source_url, settings.timeout)?;
    let notifier = build_notifier(settings)?;

    let notifier = match notifier {
        Some(n) if !settings.dry_run => n,
        other => {
            if other.is_none() {
                warn!("Telegram token or chat ids missing; new headlines will not be sent or recorded");
            } else {
                info!("Dry run; nothing will be sent or recorded");
            }
            let found = scan(&source, &store).await?;
            for h in &found.novel {
                info!(title = %h.title, url = %h.url, "New headline (not sent)");
            }
            return Ok(RunSummary {
                scraped: found.scraped,
                novel: found.novel.len(),
                notified: 0,
                pending: found.novel.len(),
            });
        }
    };

    info!(
        recipients = settings.chat_ids.len(),
        store = %store.path().display(),
        known = store.len().await?,
        "Telegram notifications enabled"
    );

    let opts = RunOptions {
        digest_size: settings.digest_size,
        confirm: settings.confirm,
        announce_first_run: true,
    };
    let summary = run_once(&source, &mut store, &notifier, &settings.chat_ids, opts).await?;

    if summary.pending > 0 {
        warn!(
            pending = summary.pending,
            "Some headlines were not confirmed; they will be retried next run"
        );
    }
    Ok(summary)
}

/// `--test-notification`: send the connection message and report.
async fn send_test_notification(settings: &Settings) -> Result<(), Box<dyn Error>> {
    let Some(notifier) = build_notifier(settings)? else {
        return Err("Telegram token and chat ids must be configured to send a test notification".into());
    };

    let report = announce(&notifier, &settings.chat_ids).await;
    info!(
        delivered = report.delivered.len(),
        attempted = report.attempted(),
        "Test notification finished"
    );
    if report.is_confirmed(Confirmation::Any) {
        Ok(())
    } else {
        Err("test notification reached no recipient".into())
    }
}
