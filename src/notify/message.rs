//! Message text sent to recipients.
//!
//! Output uses Telegram's HTML parse mode:
//!
//! ```text
//! <b>📰 Latest BBC Headlines</b>
//!
//! 1. <b>Storm batters the coast overnight</b>
//! <a href='https://www.bbc.com/news/articles/c1'>Read more →</a>
//!
//! 2. ...
//! ```

use crate::models::HeadlineRecord;
use crate::utils::{escape_html, truncate_title};
use std::fmt::Write;

/// Headlines per message. Keeps each message well below Telegram's length limit.
pub const DEFAULT_DIGEST_SIZE: usize = 5;

/// Longest title shown before it is cut and suffixed with `...`.
pub const MAX_TITLE_CHARS: usize = 80;

pub const DIGEST_HEADER: &str = "<b>📰 Latest BBC Headlines</b>";

/// One-off message sent on the first run to confirm the bot can reach recipients.
pub const CONNECTION_TEST_MESSAGE: &str = "📡 <b>BBC Headline Notifier - Connection Successful</b>\n\n\
     Your notification service is now active and ready to deliver the latest BBC headlines.\n\
     Next update: When new headlines are published.\n\n\
     <i>This is an automated message. No action is required.</i>";

/// Render one digest message for `records`, numbered from 1.
pub fn digest_message(records: &[HeadlineRecord]) -> String {
    let mut out = String::new();
    writeln!(out, "{DIGEST_HEADER}\n").unwrap();

    for (idx, record) in records.iter().enumerate() {
        let title = escape_html(&truncate_title(&record.title, MAX_TITLE_CHARS));
        writeln!(
            out,
            "{}. <b>{}</b>\n<a href='{}'>Read more →</a>\n",
            idx + 1,
            title,
            escape_html(&record.url)
        )
        .unwrap();
    }

    out.trim_end().to_string()
}
