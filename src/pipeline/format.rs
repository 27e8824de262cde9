//! Digest rendering.
//!
//! Produces a [`DigestMessage`]: a header, one block per item and a footer.
//! Transport limits are not enforced here, see [`crate::delivery::chunk_message`].

use chrono::{DateTime, Local};

use crate::models::DigestItem;

/// Text sent when a run found nothing new.
pub const NO_NEW_CONTENT: &str = "No new articles.";

const HEADER_TEMPLATE: &str = "📰 *News digest for {date}*";
const ITEM_TEMPLATE: &str = "*{n}. {title}*\n{url}";
const FOOTER_TEMPLATE: &str = "🤖 The bot collects new articles every {hours} hour(s)";
const DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Separator between header, item blocks and footer.
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// A rendered digest, kept in parts so transports can split it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestMessage {
    pub header: String,
    pub blocks: Vec<String>,
    pub footer: String,
}

impl DigestMessage {
    /// A message with no items; renders as [`NO_NEW_CONTENT`].
    pub fn empty() -> Self {
        Self {
            header: String::new(),
            blocks: Vec::new(),
            footer: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.blocks.len()
    }

    /// Full message text.
    pub fn render(&self) -> String {
        if self.is_empty() {
            return NO_NEW_CONTENT.to_string();
        }
        let mut parts = Vec::with_capacity(self.blocks.len() + 2);
        parts.push(self.header.as_str());
        parts.extend(self.blocks.iter().map(String::as_str));
        parts.push(self.footer.as_str());
        parts.join(BLOCK_SEPARATOR)
    }
}

/// Renders ranked items into a digest.
#[derive(Debug, Clone)]
pub struct DigestFormatter {
    interval_hours: u64,
}

impl DigestFormatter {
    /// `interval_hours` is the cadence described in the footer.
    pub fn new(interval_hours: u64) -> Self {
        Self { interval_hours }
    }

    /// Render at most `max_items` items as text.
    pub fn format(&self, items: &[DigestItem], max_items: usize) -> String {
        self.build(items, max_items, Local::now()).render()
    }

    /// Build the digest parts with an explicit generation time.
    pub fn build(
        &self,
        items: &[DigestItem],
        max_items: usize,
        generated_at: DateTime<Local>,
    ) -> DigestMessage {
        if items.is_empty() || max_items == 0 {
            return DigestMessage::empty();
        }

        let header = HEADER_TEMPLATE.replace("{date}", &generated_at.format(DATE_FORMAT).to_string());
        let blocks = items
            .iter()
            .take(max_items)
            .enumerate()
            .map(|(i, item)| {
                ITEM_TEMPLATE
                    .replace("{n}", &(i + 1).to_string())
                    .replace("{url}", &item.url)
                    .replace("{title}", &escape_markdown(&item.title))
            })
            .collect();
        let footer = FOOTER_TEMPLATE.replace("{hours}", &self.interval_hours.to_string());

        DigestMessage {
            header,
            blocks,
            footer,
        }
    }
}

/// Escape characters with meaning in chat Markdown.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
