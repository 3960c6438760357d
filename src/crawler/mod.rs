//! Crawler module for page fetching and breadth-first site traversal
//!
//! This module contains the core downloading and crawling logic:
//! - HTTP fetching with retry, backoff and user-agent rotation
//! - Per-host politeness rate limiting
//! - Asset discovery, download and markup rewriting
//! - Single-URL download orchestration
//! - The bounded-concurrency breadth-first crawl loop

mod assets;
mod coordinator;
mod downloader;
pub(crate) mod fetcher;
mod limiter;

pub use assets::{resolve_assets, Asset, AssetDownloader};
pub use coordinator::{discover_links, CrawlJob, CrawlResult, Crawler};
pub use downloader::Downloader;
pub use fetcher::{backoff_delay, build_http_client, fetch_static, DEFAULT_USER_AGENT};
pub use limiter::HostRateLimiter;
