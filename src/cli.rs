//! Command-line interface definitions.
//!
//! Every option is optional so that a bare invocation from cron works. Each
//! one can also come from an environment variable (or a `.env` file) and,
//! below that, from the YAML file named by `--config`.

use crate::notify::Confirmation;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the headline notifier.
///
/// # Examples
///
/// ```sh
/// # Typical scheduled run, credentials from .env
/// headline_notifier
///
/// # Explicit credentials and store location
/// headline_notifier --token 123:ABC --chat-ids 111,222 --db-path /var/lib/headlines.db
///
/// # See what would be sent without sending or recording anything
/// headline_notifier --dry-run
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, env = "HEADLINES_CONFIG")]
    pub config: Option<PathBuf>,

    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Comma separated Telegram chat ids to notify
    #[arg(long, env = "TELEGRAM_CHAT_IDS", value_delimiter = ',')]
    pub chat_ids: Vec<String>,

    /// Seen-headline store file
    #[arg(short, long, env = "HEADLINES_DB")]
    pub db_path: Option<PathBuf>,

    /// Front page to scrape
    #[arg(long, env = "HEADLINES_SOURCE_URL")]
    pub source_url: Option<String>,

    /// Telegram Bot API base URL
    #[arg(long, env = "TELEGRAM_API_BASE")]
    pub api_base: Option<String>,

    /// Timeout for every HTTP request, in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Extra delivery attempts per recipient after a failure
    #[arg(long)]
    pub max_retries: Option<usize>,

    /// Headlines per notification message
    #[arg(long)]
    pub digest_size: Option<usize>,

    /// Which recipients must accept a message before its headlines count as sent
    #[arg(long, value_enum)]
    pub confirm: Option<Confirmation>,

    /// Scrape and compare, but neither send nor record anything
    #[arg(long)]
    pub dry_run: bool,

    /// Send the connection test message and exit
    #[arg(long)]
    pub test_notification: bool,
}
