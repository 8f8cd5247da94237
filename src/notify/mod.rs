//! Notification delivery.
//!
//! - [`Notifier`]: send one message to one recipient
//! - [`RetryNotifier`]: decorator adding bounded retries with backoff to any notifier
//! - [`TelegramNotifier`]: Telegram Bot API transport
//! - [`broadcast`]: fan one message out to every recipient and report who got it
//! - [`message`]: digest and connection-test message text

pub mod message;
pub mod retry;
pub mod telegram;

pub use retry::RetryNotifier;
pub use telegram::TelegramNotifier;

use crate::error::NotifyError;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::{info, instrument, warn};

/// Delivers a formatted message to a single recipient.
pub trait Notifier {
    async fn send(&self, message: &str, recipient: &str) -> Result<(), NotifyError>;
}

/// When a broadcast counts as delivered, and its headlines may be marked seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Confirmation {
    /// Every recipient accepted the message.
    #[default]
    All,
    /// At least one recipient accepted the message.
    Any,
}

/// Per-recipient outcome of one [`broadcast`].
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub delivered: Vec<String>,
    pub failed: Vec<(String, NotifyError)>,
}

impl DeliveryReport {
    /// Whether the message reached enough recipients under `policy`.
    ///
    /// A broadcast that reached nobody is never confirmed, even with zero
    /// recipients.
    pub fn is_confirmed(&self, policy: Confirmation) -> bool {
        if self.delivered.is_empty() {
            return false;
        }
        match policy {
            Confirmation::All => self.failed.is_empty(),
            Confirmation::Any => true,
        }
    }

    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

/// Send `message` to each recipient in turn.
///
/// A failing recipient is logged and recorded; it never stops delivery to the
/// remaining ones.
#[instrument(level = "info", skip_all, fields(recipients = recipients.len()))]
pub async fn broadcast<N: Notifier>(
    notifier: &N,
    message: &str,
    recipients: &[String],
) -> DeliveryReport {
    let outcomes: Vec<(String, Result<(), NotifyError>)> = stream::iter(recipients)
        .then(|recipient| async move { (recipient.clone(), notifier.send(message, recipient).await) })
        .collect()
        .await;

    let mut report = DeliveryReport::default();
    for (recipient, outcome) in outcomes {
        match outcome {
            Ok(()) => {
                info!(%recipient, "Delivered");
                report.delivered.push(recipient);
            }
            Err(e) => {
                warn!(%recipient, error = %e, "Delivery failed");
                report.failed.push((recipient, e));
            }
        }
    }

    info!(
        delivered = report.delivered.len(),
        failed = report.failed.len(),
        "Broadcast finished"
    );
    report
}
