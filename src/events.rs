//! Crawl lifecycle events
//!
//! The core emits a typed event stream on an optional channel; presentation
//! layers (CLI progress, server-sent events) consume it without hooking into
//! the crawler's control flow.

use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;

/// Lifecycle events emitted while downloading and crawling
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    /// A crawl started from the given seed
    CrawlStarted {
        url: String,
        max_depth: u32,
        max_pages: usize,
    },
    /// A single page fetch started
    PageStarted { url: String },
    /// A page was fetched and written to disk
    PageSaved { url: String, path: PathBuf },
    /// Asset candidates were discovered on a saved page
    AssetsFound { url: String, count: usize },
    /// A page was recorded as visited (success), with the running total
    PageVisited { url: String, count: usize },
    /// A page failed terminally
    PageError { url: String, error: String },
    /// The crawl drained its frontier or hit its page budget
    CrawlDone { total: usize },
}

/// Best-effort sender for crawl events
///
/// A sink without a channel drops events. Send failures (receiver dropped)
/// are ignored so a departed consumer never stalls the crawl.
#[derive(Clone, Default)]
pub struct ProgressSink {
    sender: Option<UnboundedSender<CrawlEvent>>,
}

impl ProgressSink {
    /// Creates a sink that forwards events to `sender`
    pub fn new(sender: UnboundedSender<CrawlEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Creates a sink that drops all events
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Emits one event, ignoring a closed channel
    pub fn emit(&self, event: CrawlEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sink_forwards_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = ProgressSink::new(tx);

        sink.emit(CrawlEvent::PageStarted {
            url: "https://example.com/".to_string(),
        });

        match rx.recv().await {
            Some(CrawlEvent::PageStarted { url }) => assert_eq!(url, "https://example.com/"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_disabled_sink_drops_events() {
        let sink = ProgressSink::disabled();
        sink.emit(CrawlEvent::CrawlDone { total: 0 });
    }

    #[test]
    fn test_emit_after_receiver_dropped() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let sink = ProgressSink::new(tx);
        sink.emit(CrawlEvent::CrawlDone { total: 3 });
    }
}
