//! Sitegrab command-line interface
//!
//! Exposes `download` for single pages and `crawl` for breadth-first site
//! crawls with optional WARC export.

use anyhow::Context;
use clap::{Parser, Subcommand};
use sitegrab::config::{load_crawl_options, BasicAuth, CrawlOptions, DownloadOptions};
use sitegrab::crawler::{Crawler, Downloader};
use sitegrab::events::{CrawlEvent, ProgressSink};
use sitegrab::render::FetchMode;
use sitegrab::url::normalize_seed;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Sitegrab: a respectful website downloader and crawler
///
/// Downloads pages and crawls sites while honoring robots.txt and per-host
/// rate limits. Meant for legal and ethical use only; it will not bypass
/// paywalls, authentication or CAPTCHAs.
#[derive(Parser, Debug)]
#[command(name = "sitegrab")]
#[command(version)]
#[command(about = "A respectful website downloader and crawler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download a single page and optionally its static assets
    Download {
        /// The URL to download
        url: String,

        /// Output directory
        #[arg(short, long, default_value = "downloaded")]
        output: PathBuf,

        /// Render JavaScript before saving (requires a configured renderer)
        #[arg(long)]
        render_js: bool,

        /// Also download static assets (images/scripts/css)
        #[arg(long)]
        save_assets: bool,

        /// Ignore robots.txt (not recommended)
        #[arg(long)]
        no_robots: bool,

        /// Custom user-agent string
        #[arg(long)]
        user_agent: Option<String>,

        /// HTTP/HTTPS proxy (e.g. http://127.0.0.1:8080)
        #[arg(long)]
        proxy: Option<String>,
    },

    /// Crawl a site breadth-first from a start URL
    Crawl {
        /// Start URL for the crawl
        url: String,

        /// Optional TOML file supplying crawl defaults
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory for crawl results
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum crawl depth
        #[arg(long)]
        depth: Option<u32>,

        /// Maximum pages to visit
        #[arg(long)]
        max_pages: Option<usize>,

        /// Render JavaScript before saving (requires a configured renderer)
        #[arg(long)]
        render_js: bool,

        /// Also download static assets
        #[arg(long)]
        save_assets: bool,

        /// Keep original asset references instead of rewriting them
        #[arg(long)]
        no_rewrite_assets: bool,

        /// Allow crawling beyond the start URL's domain
        #[arg(long)]
        no_same_domain: bool,

        /// Ignore robots.txt (not recommended)
        #[arg(long)]
        no_robots: bool,

        /// Number of concurrent workers
        #[arg(long)]
        concurrency: Option<usize>,

        /// Minimum delay between requests to the same host, in seconds
        #[arg(long)]
        per_host_delay: Option<f64>,

        /// Comma-separated list of proxies to rotate
        #[arg(long)]
        proxies: Option<String>,

        /// Regex a discovered link must match to be followed
        #[arg(long = "include")]
        include_patterns: Vec<String>,

        /// Regex that excludes a discovered link
        #[arg(long = "exclude")]
        exclude_patterns: Vec<String>,

        /// Basic auth user
        #[arg(long)]
        auth_user: Option<String>,

        /// Basic auth password
        #[arg(long)]
        auth_pass: Option<String>,

        /// Custom user-agent string
        #[arg(long)]
        user_agent: Option<String>,

        /// Export the crawl to a WARC file in the output directory
        #[arg(long)]
        warc: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Download {
            url,
            output,
            render_js,
            save_assets,
            no_robots,
            user_agent,
            proxy,
        } => {
            let options = DownloadOptions {
                output_dir: output,
                user_agent,
                respect_robots: !no_robots,
                proxy,
                ..Default::default()
            };
            let mode = fetch_mode(render_js)?;
            let downloader = Downloader::new(options, mode)?;
            let target = normalize_seed(&url).context("invalid URL")?;

            let path = downloader.fetch(&target, save_assets, true, None).await?;
            println!("Saved page to: {}", path.display());
        }

        Commands::Crawl {
            url,
            config,
            output,
            depth,
            max_pages,
            render_js,
            save_assets,
            no_rewrite_assets,
            no_same_domain,
            no_robots,
            concurrency,
            per_host_delay,
            proxies,
            include_patterns,
            exclude_patterns,
            auth_user,
            auth_pass,
            user_agent,
            warc,
        } => {
            let mut options = match config {
                Some(path) => load_crawl_options(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => CrawlOptions::default(),
            };

            // CLI flags override config-file values
            if let Some(output) = output {
                options.output_dir = output;
            }
            if let Some(depth) = depth {
                options.max_depth = depth;
            }
            if let Some(max_pages) = max_pages {
                options.max_pages = max_pages;
            }
            if let Some(concurrency) = concurrency {
                options.concurrency = concurrency;
            }
            if let Some(delay) = per_host_delay {
                options.per_host_delay_secs = delay;
            }
            if let Some(list) = proxies {
                options.proxies = list.split(',').map(|p| p.trim().to_string()).collect();
            }
            if !include_patterns.is_empty() {
                options.include_patterns = include_patterns;
            }
            if !exclude_patterns.is_empty() {
                options.exclude_patterns = exclude_patterns;
            }
            if user_agent.is_some() {
                options.user_agent = user_agent;
            }
            if no_same_domain {
                options.same_domain = false;
            }
            if no_robots {
                options.respect_robots = false;
            }
            if let (Some(username), Some(password)) = (auth_user, auth_pass) {
                options.auth = Some(BasicAuth { username, password });
            }

            let output_dir = options.output_dir.clone();
            let mode = fetch_mode(render_js)?;

            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
            let reporter = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    report_event(event);
                }
            });

            println!("Starting crawl from {} -> output: {}", url, output_dir.display());
            let crawler = Crawler::new(options)?.with_progress(ProgressSink::new(tx));
            let results = crawler
                .crawl(&url, mode, save_assets, !no_rewrite_assets)
                .await?;

            if warc {
                let warc_path = output_dir.join("crawl.warc.gz");
                println!("Saving WARC to {}", warc_path.display());
                crawler.export_warc(&results, &warc_path)?;
                println!("WARC export complete");
            }

            // The crawler holds the only event sender; dropping it closes the
            // channel so the reporter drains the backlog and exits.
            drop(crawler);
            reporter.await.ok();

            let errors = results.iter().filter(|r| r.error.is_some()).count();
            println!(
                "Crawl complete: {} results ({} errors) saved into {}",
                results.len(),
                errors,
                output_dir.display()
            );
        }
    }

    Ok(())
}

/// Selects static or rendered fetching
///
/// No renderer ships with the CLI, so `--render-js` fails fast rather than
/// silently falling back to a static fetch.
fn fetch_mode(render_js: bool) -> anyhow::Result<FetchMode> {
    if render_js {
        Ok(FetchMode::rendered(None)?)
    } else {
        Ok(FetchMode::Static)
    }
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitegrab=info,warn"),
            1 => EnvFilter::new("sitegrab=debug,info"),
            2 => EnvFilter::new("sitegrab=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Prints one crawl lifecycle event
fn report_event(event: CrawlEvent) {
    match event {
        CrawlEvent::CrawlStarted {
            url,
            max_depth,
            max_pages,
        } => tracing::info!("Crawl started: {} (depth<={}, pages<={})", url, max_depth, max_pages),
        CrawlEvent::PageVisited { url, count } => {
            tracing::info!("[{}] visited {}", count, url)
        }
        CrawlEvent::PageError { url, error } => tracing::warn!("{}: {}", url, error),
        CrawlEvent::CrawlDone { total } => tracing::info!("Crawl done: {} pages", total),
        _ => {}
    }
}
