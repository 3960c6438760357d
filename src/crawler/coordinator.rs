//! Breadth-first crawl orchestration
//!
//! The [`Crawler`] drains a shared FIFO frontier with a fixed pool of
//! persistent worker tasks. Workers share the visited set, the per-host rate
//! limiter and the result list; one page's failure is never fatal to the
//! crawl.

use crate::config::{CrawlOptions, DownloadOptions};
use crate::crawler::downloader::Downloader;
use crate::crawler::limiter::HostRateLimiter;
use crate::events::{CrawlEvent, ProgressSink};
use crate::render::FetchMode;
use crate::robots::RobotsGate;
use crate::url::{netloc, normalize_seed};
use crate::{GrabError, Result};
use regex_lite::Regex;
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

/// A URL queued for fetching, with its distance from the seed
#[derive(Debug, Clone)]
pub struct CrawlJob {
    pub url: Url,
    pub depth: u32,
}

/// Outcome of crawling one URL
///
/// Exactly one of these is produced per distinct dispatched URL, whether the
/// fetch succeeded, robots denied it, or it failed terminally.
#[derive(Debug, Clone)]
pub struct CrawlResult {
    pub url: String,
    pub saved_path: Option<PathBuf>,
    pub error: Option<String>,
}

/// State shared by all workers of one crawl
struct CrawlState {
    /// URLs reserved by a worker; check-and-insert is one critical section
    visited: Mutex<HashSet<String>>,
    /// FIFO frontier of pending jobs
    frontier: Mutex<VecDeque<CrawlJob>>,
    /// Append-only result list, bounded by max_pages
    results: Mutex<Vec<CrawlResult>>,
    /// Jobs currently being processed; workers exit when the frontier is
    /// empty and this reaches zero
    in_flight: AtomicUsize,
    /// Job counter used for round-robin proxy rotation
    dispatched: AtomicUsize,
}

/// Everything a worker needs, bundled for cheap Arc cloning
struct CrawlContext {
    options: CrawlOptions,
    seed_host: String,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    robots: Arc<RobotsGate>,
    limiter: HostRateLimiter,
    progress: ProgressSink,
    mode: FetchMode,
    save_assets: bool,
    rewrite_assets: bool,
    user_agent: String,
    state: CrawlState,
}

/// Breadth-first site crawler with bounded concurrency
///
/// A `Crawler` is intended to run one crawl per instance; the visited set
/// and per-host timestamps are created fresh for each `crawl` call.
pub struct Crawler {
    options: CrawlOptions,
    progress: ProgressSink,
}

impl Crawler {
    /// Creates a crawler after validating the options
    pub fn new(options: CrawlOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            progress: ProgressSink::disabled(),
        })
    }

    /// Attaches a progress event sink
    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Crawls breadth-first from `seed`, returning one result per page
    ///
    /// Results are ordered by completion, not discovery; workers run
    /// concurrently and that nondeterminism is accepted. Include/exclude
    /// filters apply to discovered links only, never to the seed.
    pub async fn crawl(
        &self,
        seed: &str,
        mode: FetchMode,
        save_assets: bool,
        rewrite_assets: bool,
    ) -> Result<Vec<CrawlResult>> {
        let seed_url = normalize_seed(seed)?;
        let seed_host = netloc(&seed_url);

        self.progress.emit(CrawlEvent::CrawlStarted {
            url: seed_url.to_string(),
            max_depth: self.options.max_depth,
            max_pages: self.options.max_pages,
        });
        tracing::info!(
            "Starting crawl from {} (max_depth={}, max_pages={}, concurrency={})",
            seed_url,
            self.options.max_depth,
            self.options.max_pages,
            self.options.concurrency
        );

        let include = compile_patterns(&self.options.include_patterns)?;
        let exclude = compile_patterns(&self.options.exclude_patterns)?;

        let user_agent = self
            .options
            .user_agent
            .clone()
            .unwrap_or_else(|| crate::crawler::fetcher::DEFAULT_USER_AGENT.to_string());
        let robots_client = crate::crawler::fetcher::build_http_client(
            &user_agent,
            std::time::Duration::from_secs(self.options.timeout_secs),
            None,
        )?;
        let robots = Arc::new(RobotsGate::new(
            robots_client,
            self.options.respect_robots,
        ));

        let mut frontier = VecDeque::new();
        frontier.push_back(CrawlJob {
            url: seed_url,
            depth: 0,
        });

        let ctx = Arc::new(CrawlContext {
            options: self.options.clone(),
            seed_host,
            include,
            exclude,
            robots,
            limiter: HostRateLimiter::new(self.options.per_host_delay()),
            progress: self.progress.clone(),
            mode,
            save_assets,
            rewrite_assets,
            user_agent,
            state: CrawlState {
                visited: Mutex::new(HashSet::new()),
                frontier: Mutex::new(frontier),
                results: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                dispatched: AtomicUsize::new(0),
            },
        });

        let mut workers = Vec::with_capacity(self.options.concurrency);
        for worker_id in 0..self.options.concurrency {
            let ctx = Arc::clone(&ctx);
            workers.push(tokio::spawn(async move {
                worker_loop(worker_id, ctx).await;
            }));
        }
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("Crawl worker panicked: {}", e);
            }
        }

        let results = {
            let mut guard = ctx.state.results.lock().unwrap();
            std::mem::take(&mut *guard)
        };

        self.progress.emit(CrawlEvent::CrawlDone {
            total: results.len(),
        });
        tracing::info!("Crawl complete: {} results", results.len());

        Ok(results)
    }

    /// Exports crawl results to a gzip-compressed WARC file
    pub fn export_warc(&self, results: &[CrawlResult], warc_path: &Path) -> Result<PathBuf> {
        crate::warc::export_warc(
            results,
            &self.options.output_dir,
            warc_path,
            &crate::warc::CrawlMetadata {
                max_depth: self.options.max_depth,
                max_pages: self.options.max_pages,
                concurrency: self.options.concurrency,
                respect_robots: self.options.respect_robots,
            },
        )
    }
}

/// Compiles filter patterns, surfacing the offending pattern on error
fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| GrabError::InvalidPattern {
                pattern: p.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// One persistent worker: pulls jobs until the crawl is done
///
/// A worker stops when the page budget is reached, or when the frontier is
/// empty and no other worker is mid-job (an in-flight job may still enqueue
/// new links, so an empty frontier alone is not termination).
async fn worker_loop(worker_id: usize, ctx: Arc<CrawlContext>) {
    loop {
        {
            let results = ctx.state.results.lock().unwrap();
            if results.len() >= ctx.options.max_pages {
                break;
            }
        }

        let job = {
            let mut frontier = ctx.state.frontier.lock().unwrap();
            match frontier.pop_front() {
                Some(job) => {
                    // Claim before releasing the lock so other workers never
                    // observe "frontier empty, nothing in flight" mid-handoff.
                    ctx.state.in_flight.fetch_add(1, Ordering::SeqCst);
                    Some(job)
                }
                None => None,
            }
        };

        match job {
            Some(job) => {
                tracing::debug!("Worker {} processing {}", worker_id, job.url);
                process_job(&ctx, job).await;
                ctx.state.in_flight.fetch_sub(1, Ordering::SeqCst);
            }
            None => {
                if ctx.state.in_flight.load(Ordering::SeqCst) == 0 {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            }
        }
    }
}

/// Processes one crawl job to completion
async fn process_job(ctx: &CrawlContext, job: CrawlJob) {
    let url_key = job.url.to_string();

    // Atomic check-and-reserve: at most one worker proceeds per URL.
    {
        let mut visited = ctx.state.visited.lock().unwrap();
        if !visited.insert(url_key.clone()) {
            return;
        }
    }

    if ctx.options.respect_robots && !ctx.robots.allowed(&job.url, &ctx.user_agent).await {
        tracing::debug!("Disallowed by robots: {}", job.url);
        push_result(
            ctx,
            CrawlResult {
                url: url_key.clone(),
                saved_path: None,
                error: Some("Disallowed by robots.txt".to_string()),
            },
        );
        ctx.progress.emit(CrawlEvent::PageError {
            url: url_key,
            error: "Disallowed by robots.txt".to_string(),
        });
        return;
    }

    ctx.limiter.wait_turn(&netloc(&job.url)).await;

    let downloader = match build_job_downloader(ctx) {
        Ok(d) => d,
        Err(e) => {
            record_error(ctx, &url_key, &e.to_string());
            return;
        }
    };

    match downloader
        .fetch(&job.url, ctx.save_assets, ctx.rewrite_assets, None)
        .await
    {
        Ok(saved) => {
            let count = push_result(
                ctx,
                CrawlResult {
                    url: url_key.clone(),
                    saved_path: Some(saved.clone()),
                    error: None,
                },
            );
            ctx.progress.emit(CrawlEvent::PageVisited {
                url: url_key,
                count,
            });

            // Discovery always runs; links past max_depth are discarded at
            // enqueue rather than skipping discovery itself.
            let html = std::fs::read_to_string(&saved).unwrap_or_default();
            let links = discover_links(&html, &job.url);
            enqueue_links(ctx, links, job.depth + 1);
        }
        Err(e) => {
            tracing::warn!("Failed fetching {}: {}", job.url, e);
            record_error(ctx, &url_key, &e.to_string());
        }
    }
}

/// Builds the per-job downloader, rotating proxies round-robin
fn build_job_downloader(ctx: &CrawlContext) -> Result<Downloader> {
    let proxy = if ctx.options.proxies.is_empty() {
        None
    } else {
        let n = ctx.state.dispatched.fetch_add(1, Ordering::Relaxed);
        Some(ctx.options.proxies[n % ctx.options.proxies.len()].clone())
    };

    let options = DownloadOptions {
        output_dir: ctx.options.output_dir.clone(),
        user_agent: ctx.options.user_agent.clone(),
        respect_robots: ctx.options.respect_robots,
        timeout_secs: ctx.options.timeout_secs,
        asset_delay_secs: ctx.options.per_host_delay_secs,
        proxy,
        auth: ctx.options.auth.clone(),
    };

    Ok(Downloader::new(options, ctx.mode.clone())?
        .with_robots(Arc::clone(&ctx.robots))
        .with_progress(ctx.progress.clone()))
}

/// Appends a result unless the page budget is already spent
///
/// Returns the result count afterwards. The budget check and the append are
/// one critical section, so the result list never exceeds max_pages even
/// with several in-flight workers finishing at once.
fn push_result(ctx: &CrawlContext, result: CrawlResult) -> usize {
    let mut results = ctx.state.results.lock().unwrap();
    if results.len() < ctx.options.max_pages {
        results.push(result);
    }
    results.len()
}

fn record_error(ctx: &CrawlContext, url: &str, error: &str) {
    push_result(
        ctx,
        CrawlResult {
            url: url.to_string(),
            saved_path: None,
            error: Some(error.to_string()),
        },
    );
    ctx.progress.emit(CrawlEvent::PageError {
        url: url.to_string(),
        error: error.to_string(),
    });
}

/// Extracts outbound links from markup, resolved against the page URL
///
/// Skips `javascript:`, `mailto:`, `tel:` and data URIs; unparseable hrefs
/// are dropped.
pub fn discover_links(html: &str, base_url: &Url) -> Vec<Url> {
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let document = Html::parse_document(html);
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let href = match element.value().attr("href") {
            Some(h) => h.trim(),
            None => continue,
        };
        if href.is_empty()
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with("data:")
        {
            continue;
        }
        match base_url.join(href) {
            Ok(resolved) => links.push(resolved),
            Err(e) => tracing::debug!("Skipping unresolvable link {:?}: {}", href, e),
        }
    }

    links
}

/// Applies filters and bounds, then pushes surviving links onto the frontier
///
/// Drops links beyond max_depth, cross-domain links under same_domain,
/// include/exclude filter misses, already-visited URLs, and anything past
/// the memory bound `visited + frontier >= max_pages`.
fn enqueue_links(ctx: &CrawlContext, links: Vec<Url>, depth: u32) {
    if depth > ctx.options.max_depth {
        return;
    }

    let visited = ctx.state.visited.lock().unwrap();
    let mut frontier = ctx.state.frontier.lock().unwrap();

    for link in links {
        let link_str = link.to_string();

        if !ctx.include.is_empty() && !ctx.include.iter().any(|p| p.is_match(&link_str)) {
            continue;
        }
        if ctx.exclude.iter().any(|p| p.is_match(&link_str)) {
            continue;
        }
        if ctx.options.same_domain && netloc(&link) != ctx.seed_host {
            tracing::debug!("Skipping different-domain URL {}", link);
            continue;
        }
        if visited.contains(&link_str) {
            continue;
        }
        if visited.len() + frontier.len() >= ctx.options.max_pages {
            break;
        }

        frontier.push_back(CrawlJob { url: link, depth });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_links_resolves_and_filters() {
        let html = r#"<html><body>
            <a href="/one">One</a>
            <a href="https://other.example/two">Two</a>
            <a href="mailto:someone@example.com">Mail</a>
            <a href="javascript:void(0)">JS</a>
            <a href="tel:+123">Call</a>
        </body></html>"#;
        let base = Url::parse("https://example.com/start").unwrap();

        let links = discover_links(html, &base);
        let strs: Vec<&str> = links.iter().map(|u| u.as_str()).collect();
        assert_eq!(
            strs,
            vec!["https://example.com/one", "https://other.example/two"]
        );
    }

    #[test]
    fn test_discover_links_empty_document() {
        let base = Url::parse("https://example.com/").unwrap();
        assert!(discover_links("", &base).is_empty());
    }

    #[test]
    fn test_compile_patterns_reports_pattern() {
        let err = compile_patterns(&["(broken".to_string()]).unwrap_err();
        match err {
            GrabError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "(broken"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_crawler_rejects_invalid_options() {
        let options = CrawlOptions {
            concurrency: 0,
            ..Default::default()
        };
        assert!(Crawler::new(options).is_err());
    }
}
