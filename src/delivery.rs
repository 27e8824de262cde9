// src/delivery.rs

//! Outbound delivery of digests.
//!
//! The messaging transport itself lives outside this crate; it receives
//! the digest already split into chunks that respect its size limits.

use async_trait::async_trait;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::Result;
use crate::models::DeliveryConfig;
use crate::pipeline::format::{BLOCK_SEPARATOR, DigestMessage};

const ELLIPSIS: char = '…';

/// Destination for rendered digests.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver the chunks, in order, to `channel`.
    async fn deliver(&self, channel: &str, chunks: &[String]) -> Result<()>;
}

/// Writes digests to standard output.
#[derive(Debug, Default, Clone)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn deliver(&self, channel: &str, chunks: &[String]) -> Result<()> {
        for (i, chunk) in chunks.iter().enumerate() {
            println!("── {} [{}/{}] ──", channel, i + 1, chunks.len());
            println!("{}", chunk);
        }
        log::info!("Delivered {} message(s) to {}", chunks.len(), channel);
        Ok(())
    }
}

impl DigestMessage {
    /// Split into transport-sized messages, see [`chunk_message`].
    pub fn chunks(&self, limits: &DeliveryConfig) -> Vec<String> {
        chunk_message(self, limits)
    }
}

/// Split a digest into messages of at most `max_message_chars` characters
/// and `max_items_per_message` item blocks.
///
/// Order is preserved and no block is split across messages. The header
/// opens the first message and the footer closes the last one. A block that
/// cannot fit in a message on its own is cut at a grapheme boundary and
/// ends with an ellipsis.
pub fn chunk_message(message: &DigestMessage, limits: &DeliveryConfig) -> Vec<String> {
    if message.is_empty() {
        return vec![message.render()];
    }

    let max_chars = limits.max_message_chars.max(1);
    let max_items = limits.max_items_per_message.max(1);

    let mut chunker = Chunker::new(max_chars);
    chunker.current = fit(&message.header, max_chars);

    for block in &message.blocks {
        if chunker.items == max_items {
            chunker.flush();
        }
        chunker.push(&fit(block, max_chars));
        chunker.items += 1;
    }

    chunker.push(&fit(&message.footer, max_chars));
    chunker.finish()
}

struct Chunker {
    max_chars: usize,
    chunks: Vec<String>,
    current: String,
    items: usize,
}

impl Chunker {
    fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            chunks: Vec::new(),
            current: String::new(),
            items: 0,
        }
    }

    fn push(&mut self, part: &str) {
        if !self.current.is_empty() {
            let joined = char_len(&self.current) + char_len(BLOCK_SEPARATOR) + char_len(part);
            if joined > self.max_chars {
                self.flush();
            }
        }
        if !self.current.is_empty() {
            self.current.push_str(BLOCK_SEPARATOR);
        }
        self.current.push_str(part);
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.chunks.push(std::mem::take(&mut self.current));
        }
        self.items = 0;
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.chunks
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Cut `text` to at most `max_chars` characters without splitting a
/// grapheme cluster.
fn fit(text: &str, max_chars: usize) -> String {
    if char_len(text) <= max_chars {
        return text.to_string();
    }

    let budget = max_chars.saturating_sub(1);
    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let len = char_len(grapheme);
        if used + len > budget {
            break;
        }
        out.push_str(grapheme);
        used += len;
    }
    out.push(ELLIPSIS);
    out
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every delivery.
    #[derive(Default)]
    pub struct RecordingNotifier {
        deliveries: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn deliveries(&self) -> Vec<(String, Vec<String>)> {
            self.deliveries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn deliver(&self, channel: &str, chunks: &[String]) -> Result<()> {
            self.deliveries
                .lock()
                .unwrap()
                .push((channel.to_string(), chunks.to_vec()));
            Ok(())
        }
    }
}
