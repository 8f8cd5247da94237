//! Telegram Bot API transport.
//!
//! Messages go out through `sendMessage` with HTML parse mode and link previews
//! disabled. The bot token is part of the endpoint path, so it is kept out of
//! every log line and out of the `Debug` output.

use super::Notifier;
use crate::error::NotifyError;
use crate::utils::truncate_for_log;
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

impl<'a> SendMessage<'a> {
    fn html(chat_id: &'a str, text: &'a str) -> Self {
        Self {
            chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        }
    }
}

#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    endpoint: String,
}

impl TelegramNotifier {
    pub fn new(token: &str, api_base: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: send_message_endpoint(api_base, token),
        })
    }
}

impl fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("endpoint", &"<redacted>")
            .finish()
    }
}

impl Notifier for TelegramNotifier {
    #[instrument(level = "info", skip_all, fields(%recipient))]
    async fn send(&self, message: &str, recipient: &str) -> Result<(), NotifyError> {
        let payload = SendMessage::html(recipient, message);
        let request_err = |source| NotifyError::Request {
            recipient: recipient.to_string(),
            source: strip_url(source),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(request_err)?;

        let status = response.status();
        debug!(status = status.as_u16(), "Telegram responded");
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected {
            recipient: recipient.to_string(),
            status: status.as_u16(),
            body: truncate_for_log(&body, 200),
        })
    }
}

fn send_message_endpoint(api_base: &str, token: &str) -> String {
    format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), token)
}

/// reqwest errors print the request URL, which contains the bot token.
fn strip_url(e: reqwest::Error) -> reqwest::Error {
    e.without_url()
}
