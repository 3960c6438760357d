//! Configuration types for download and crawl operations
//!
//! Options are normally populated from CLI flags; `crawl` additionally
//! accepts a TOML file supplying defaults, with flags taking precedence.

use crate::ConfigError;
use regex_lite::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Basic auth credentials forwarded with every request
#[derive(Debug, Clone, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// Options for a single-page download
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadOptions {
    /// Directory pages and assets are written into
    pub output_dir: PathBuf,

    /// Custom user-agent; defaults to a desktop browser string
    pub user_agent: Option<String>,

    /// Whether to honor robots.txt (recommended)
    pub respect_robots: bool,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Minimum delay between consecutive asset downloads, in seconds
    pub asset_delay_secs: f64,

    /// Optional HTTP/HTTPS proxy URL
    pub proxy: Option<String>,

    /// Optional basic auth credentials
    pub auth: Option<BasicAuth>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloaded"),
            user_agent: None,
            respect_robots: true,
            timeout_secs: 30,
            asset_delay_secs: 0.5,
            proxy: None,
            auth: None,
        }
    }
}

impl DownloadOptions {
    /// Per-request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Options for a multi-page crawl
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlOptions {
    /// Directory pages and assets are written into
    pub output_dir: PathBuf,

    /// Custom user-agent; defaults to a desktop browser string
    pub user_agent: Option<String>,

    /// Maximum link depth from the seed URL (0 = seed only)
    pub max_depth: u32,

    /// Stop after this many pages have produced results
    pub max_pages: usize,

    /// Restrict crawling to the seed URL's host
    pub same_domain: bool,

    /// Number of concurrent worker tasks
    pub concurrency: usize,

    /// Minimum delay between requests to the same host, in seconds
    pub per_host_delay_secs: f64,

    /// Proxies rotated across crawl jobs (round-robin)
    pub proxies: Vec<String>,

    /// Whether to honor robots.txt (recommended)
    pub respect_robots: bool,

    /// Regexes a discovered link must match to be enqueued (empty = all)
    pub include_patterns: Vec<String>,

    /// Regexes that exclude a discovered link from the frontier
    pub exclude_patterns: Vec<String>,

    /// Optional basic auth credentials
    pub auth: Option<BasicAuth>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloaded_crawl"),
            user_agent: None,
            max_depth: 2,
            max_pages: 100,
            same_domain: true,
            concurrency: 4,
            per_host_delay_secs: 0.5,
            proxies: Vec::new(),
            respect_robots: true,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            auth: None,
            timeout_secs: 30,
        }
    }
}

impl CrawlOptions {
    /// Per-host politeness delay as a Duration
    pub fn per_host_delay(&self) -> Duration {
        Duration::from_secs_f64(self.per_host_delay_secs)
    }

    /// Validates option ranges and filter patterns
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Validation(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_pages == 0 {
            return Err(ConfigError::Validation(
                "max_pages must be at least 1".to_string(),
            ));
        }
        for pattern in self.include_patterns.iter().chain(&self.exclude_patterns) {
            Regex::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("invalid filter pattern {:?}: {}", pattern, e))
            })?;
        }
        Ok(())
    }
}

/// Loads crawl options from a TOML file
pub fn load_crawl_options(path: &Path) -> Result<CrawlOptions, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let options: CrawlOptions = toml::from_str(&content)?;
    options.validate()?;
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CrawlOptions::default();
        assert_eq!(options.max_depth, 2);
        assert_eq!(options.max_pages, 100);
        assert_eq!(options.concurrency, 4);
        assert!(options.same_domain);
        assert!(options.respect_robots);
        assert_eq!(options.per_host_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let options = CrawlOptions {
            concurrency: 0,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_pattern() {
        let options = CrawlOptions {
            include_patterns: vec!["(unclosed".to_string()],
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_src = r#"
            max_depth = 3
            max_pages = 10
            concurrency = 2
            same_domain = false
            per_host_delay_secs = 1.5
            exclude_patterns = ["\\.pdf$"]
        "#;
        let options: CrawlOptions = toml::from_str(toml_src).unwrap();
        assert_eq!(options.max_depth, 3);
        assert_eq!(options.max_pages, 10);
        assert!(!options.same_domain);
        assert_eq!(options.per_host_delay(), Duration::from_millis(1500));
        assert!(options.validate().is_ok());
        // Unspecified fields fall back to defaults
        assert_eq!(options.output_dir, PathBuf::from("downloaded_crawl"));
    }
}
