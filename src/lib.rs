//! Sitegrab: a respectful website downloader and site crawler
//!
//! This crate downloads single pages (optionally through a pluggable
//! JS-rendering capability), mirrors their static assets, and crawls sites
//! breadth-first while respecting robots.txt and per-host rate limits.
//! Crawl results can be exported to a gzip-compressed WARC archive.

pub mod config;
pub mod crawler;
pub mod events;
pub mod render;
pub mod robots;
pub mod url;
pub mod warc;

use thiserror::Error;

/// Main error type for sitegrab operations
#[derive(Debug, Error)]
pub enum GrabError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetching {url} disallowed by robots.txt")]
    RobotsDenied { url: String },

    #[error("Failed to fetch {url} after {attempts} attempts: {source}")]
    Transport {
        url: String,
        attempts: u32,
        source: reqwest::Error,
    },

    #[error("JS rendering failed for {url}: {message}")]
    Render { url: String, message: String },

    #[error("JS rendering requested but no renderer is configured")]
    RendererUnavailable,

    #[error("WARC export error: {0}")]
    Export(String),

    #[error("Invalid link filter pattern {pattern}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for sitegrab operations
pub type Result<T> = std::result::Result<T, GrabError>;

// Re-export commonly used types
pub use config::{CrawlOptions, DownloadOptions};
pub use crawler::{CrawlResult, Crawler, Downloader};
pub use events::CrawlEvent;
pub use render::FetchMode;
pub use robots::RobotsGate;
