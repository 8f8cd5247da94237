//! Runtime settings, layered from CLI/env over an optional YAML file over defaults.
//!
//! ```yaml
//! # notifier.yaml
//! token: "123456:ABC-DEF"
//! chat_ids: ["111111", "-100222222"]
//! db_path: /var/lib/headline_notifier/headlines.db
//! timeout_secs: 15
//! max_retries: 3
//! digest_size: 5
//! confirm: all
//! ```

use crate::cli::Cli;
use crate::error::ConfigError;
use crate::notify::Confirmation;
use crate::notify::message::DEFAULT_DIGEST_SIZE;
use crate::notify::telegram::DEFAULT_API_BASE;
use crate::scrapers::bbc::DEFAULT_SOURCE_URL;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

pub const DEFAULT_DB_PATH: &str = "headlines.db";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Contents of the optional YAML config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub token: Option<String>,
    pub chat_ids: Vec<String>,
    pub db_path: Option<PathBuf>,
    pub source_url: Option<String>,
    pub api_base: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<usize>,
    pub digest_size: Option<usize>,
    pub confirm: Option<Confirmation>,
}

impl FileConfig {
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: FileConfig = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config file");
        Ok(config)
    }
}

/// Fully resolved settings for one run.
#[derive(Clone)]
pub struct Settings {
    pub token: Option<String>,
    pub chat_ids: Vec<String>,
    pub db_path: PathBuf,
    pub source_url: String,
    pub api_base: String,
    pub timeout: Duration,
    pub max_retries: usize,
    pub digest_size: usize,
    pub confirm: Confirmation,
    pub dry_run: bool,
    pub test_notification: bool,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("chat_ids", &self.chat_ids)
            .field("db_path", &self.db_path)
            .field("source_url", &self.source_url)
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("digest_size", &self.digest_size)
            .field("confirm", &self.confirm)
            .field("dry_run", &self.dry_run)
            .field("test_notification", &self.test_notification)
            .finish()
    }
}

impl Settings {
    /// Resolve settings from parsed CLI arguments, reading `--config` if given.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Ok(Self::merge(cli, file))
    }

    /// CLI/env values win over file values, which win over defaults.
    pub fn merge(cli: &Cli, file: FileConfig) -> Self {
        let token = non_blank(cli.token.clone()).or_else(|| non_blank(file.token));
        let chat_ids = if clean_recipients(&cli.chat_ids).is_empty() {
            clean_recipients(&file.chat_ids)
        } else {
            clean_recipients(&cli.chat_ids)
        };

        Self {
            token,
            chat_ids,
            db_path: cli
                .db_path
                .clone()
                .or(file.db_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            source_url: cli
                .source_url
                .clone()
                .or(file.source_url)
                .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            api_base: cli
                .api_base
                .clone()
                .or(file.api_base)
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            timeout: Duration::from_secs(
                cli.timeout_secs
                    .or(file.timeout_secs)
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            max_retries: cli
                .max_retries
                .or(file.max_retries)
                .unwrap_or(DEFAULT_MAX_RETRIES),
            digest_size: cli
                .digest_size
                .or(file.digest_size)
                .unwrap_or(DEFAULT_DIGEST_SIZE)
                .max(1),
            confirm: cli.confirm.or(file.confirm).unwrap_or_default(),
            dry_run: cli.dry_run,
            test_notification: cli.test_notification,
        }
    }

    /// Token and at least one recipient are configured.
    pub fn notifications_enabled(&self) -> bool {
        self.token.is_some() && !self.chat_ids.is_empty()
    }
}

/// Trim recipient ids and drop empty ones.
pub fn clean_recipients(raw: &[String]) -> Vec<String> {
    raw.iter()
        .flat_map(|s| s.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
