//! Single-URL download orchestration
//!
//! The [`Downloader`] is the unit of work shared by the single-page CLI path
//! and the crawler: robots check, fetch (static or rendered), page persist,
//! and optional asset handling for exactly one URL.

use crate::config::DownloadOptions;
use crate::crawler::assets::{resolve_assets, AssetDownloader};
use crate::crawler::fetcher::{build_http_client, fetch_static, DEFAULT_USER_AGENT};
use crate::events::{CrawlEvent, ProgressSink};
use crate::render::{FetchMode, BLOCKED_RESOURCE_TYPES};
use crate::robots::RobotsGate;
use crate::url::page_filename;
use crate::{GrabError, Result};
use reqwest::Client;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Downloads one page and its assets into an output directory
pub struct Downloader {
    options: DownloadOptions,
    mode: FetchMode,
    client: Client,
    robots: Arc<RobotsGate>,
    user_agent: String,
    progress: ProgressSink,
}

impl Downloader {
    /// Creates a downloader with its own HTTP client and robots gate
    pub fn new(options: DownloadOptions, mode: FetchMode) -> Result<Self> {
        let user_agent = options
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let client = build_http_client(&user_agent, options.timeout(), options.proxy.as_deref())?;
        let robots = Arc::new(RobotsGate::new(client.clone(), options.respect_robots));

        Ok(Self {
            options,
            mode,
            client,
            robots,
            user_agent,
            progress: ProgressSink::disabled(),
        })
    }

    /// Replaces the robots gate with a shared one
    ///
    /// The crawler passes a crawl-wide gate so per-origin policies are
    /// fetched once per crawl instead of once per downloader.
    pub fn with_robots(mut self, robots: Arc<RobotsGate>) -> Self {
        self.robots = robots;
        self
    }

    /// Attaches a progress event sink
    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Whether robots.txt allows fetching `url`
    pub async fn allowed_by_robots(&self, url: &Url) -> bool {
        self.robots.allowed(url, &self.user_agent).await
    }

    /// Fetches `url` and saves the result to disk, returning the saved path
    ///
    /// Robots denial and fetch exhaustion are fatal and propagate to the
    /// caller; individual asset failures are logged and skipped. With
    /// `rewrite_assets` the saved markup references the local asset copies.
    pub async fn fetch(
        &self,
        url: &Url,
        save_assets: bool,
        rewrite_assets: bool,
        custom_filename: Option<&str>,
    ) -> Result<PathBuf> {
        if !self.allowed_by_robots(url).await {
            return Err(GrabError::RobotsDenied {
                url: url.to_string(),
            });
        }

        self.progress.emit(CrawlEvent::PageStarted {
            url: url.to_string(),
        });
        tracing::info!(
            "Fetching {} (mode={:?}, save_assets={})",
            url,
            self.mode,
            save_assets
        );

        let mut content = match &self.mode {
            FetchMode::Static => {
                fetch_static(
                    &self.client,
                    url,
                    self.options.user_agent.as_deref(),
                    self.options.auth.as_ref(),
                )
                .await?
            }
            FetchMode::Rendered(renderer) => {
                renderer
                    .render(url.as_str(), self.options.timeout(), BLOCKED_RESOURCE_TYPES)
                    .await?
            }
        };

        if save_assets {
            let assets = resolve_assets(&content, url);
            self.progress.emit(CrawlEvent::AssetsFound {
                url: url.to_string(),
                count: assets.len(),
            });

            let downloader = AssetDownloader::new(
                self.client.clone(),
                Arc::clone(&self.robots),
                self.options.output_dir.clone(),
                self.user_agent.clone(),
            );
            let delay = std::time::Duration::from_secs_f64(self.options.asset_delay_secs);
            if rewrite_assets {
                content = downloader.download_and_rewrite(&content, &assets, delay).await;
            } else {
                downloader.download_all(&assets, delay).await;
            }
        }

        let filename = page_filename(&self.options.output_dir, url, custom_filename);
        if let Some(parent) = filename.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&filename, &content)?;

        self.progress.emit(CrawlEvent::PageSaved {
            url: url.to_string(),
            path: filename.clone(),
        });
        tracing::info!("Saved page {} -> {}", url, filename.display());

        Ok(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options_for(dir: &TempDir) -> DownloadOptions {
        DownloadOptions {
            output_dir: dir.path().to_path_buf(),
            timeout_secs: 5,
            asset_delay_secs: 0.0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_saves_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/about"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><title>About</title></html>"),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let downloader = Downloader::new(options_for(&dir), FetchMode::Static).unwrap();
        let url = Url::parse(&format!("{}/about", server.uri())).unwrap();

        let saved = downloader.fetch(&url, false, false, None).await.unwrap();
        assert!(saved.exists());
        let body = fs::read_to_string(&saved).unwrap();
        assert!(body.contains("<title>About</title>"));
        // Derived name ends in .html since the path has no extension
        assert_eq!(saved.extension().unwrap(), "html");
    }

    #[tokio::test]
    async fn test_fetch_robots_denied_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let downloader = Downloader::new(options_for(&dir), FetchMode::Static).unwrap();
        let url = Url::parse(&format!("{}/private/page", server.uri())).unwrap();

        let err = downloader.fetch(&url, false, false, None).await.unwrap_err();
        assert!(matches!(err, GrabError::RobotsDenied { .. }));
    }

    #[tokio::test]
    async fn test_fetch_twice_overwrites_deterministically() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>v</html>"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let downloader = Downloader::new(options_for(&dir), FetchMode::Static).unwrap();
        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();

        let first = downloader
            .fetch(&url, false, false, Some("snapshot"))
            .await
            .unwrap();
        let second = downloader
            .fetch(&url, false, false, Some("snapshot"))
            .await
            .unwrap();
        assert_eq!(first, second);

        // Exactly one page file accumulated
        let pages = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .count();
        assert_eq!(pages, 1);
    }

    #[tokio::test]
    async fn test_fetch_with_asset_rewrite() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<html><body><img src="/a.png"></body></html>"#),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/a.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89u8, 0x50, 0x4e]))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let downloader = Downloader::new(options_for(&dir), FetchMode::Static).unwrap();
        let url = Url::parse(&format!("{}/", server.uri())).unwrap();

        let saved = downloader.fetch(&url, true, true, None).await.unwrap();

        let host_dir = crate::url::safe_host(&url);
        let asset = dir.path().join("assets").join(&host_dir).join("a.png");
        assert!(asset.exists(), "asset should be saved at {:?}", asset);

        let body = fs::read_to_string(&saved).unwrap();
        assert!(!body.contains(r#"src="/a.png""#));
        assert!(body.contains(&format!(r#"src="assets/{}/a.png""#, host_dir)));
    }

    #[tokio::test]
    async fn test_rendered_fetch_passes_blocked_resource_types() {
        use crate::render::PageRenderer;
        use std::sync::Mutex;
        use std::time::Duration;

        struct CapturingRenderer {
            blocked: Mutex<Vec<String>>,
        }

        #[async_trait::async_trait]
        impl PageRenderer for CapturingRenderer {
            async fn render(
                &self,
                _url: &str,
                _timeout: Duration,
                blocked_types: &[&str],
            ) -> crate::Result<String> {
                let mut blocked = self.blocked.lock().unwrap();
                *blocked = blocked_types.iter().map(|t| t.to_string()).collect();
                Ok("<html>rendered</html>".to_string())
            }
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let renderer = Arc::new(CapturingRenderer {
            blocked: Mutex::new(Vec::new()),
        });
        let dir = TempDir::new().unwrap();
        let mode = FetchMode::Rendered(Arc::clone(&renderer) as Arc<dyn PageRenderer>);
        let downloader = Downloader::new(options_for(&dir), mode).unwrap();
        let url = Url::parse(&format!("{}/app", server.uri())).unwrap();

        let saved = downloader.fetch(&url, false, false, None).await.unwrap();
        assert_eq!(fs::read_to_string(&saved).unwrap(), "<html>rendered</html>");
        assert_eq!(*renderer.blocked.lock().unwrap(), BLOCKED_RESOURCE_TYPES);
    }

    #[tokio::test]
    async fn test_asset_failure_does_not_fail_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<html><img src="/missing.png"></html>"#),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let downloader = Downloader::new(options_for(&dir), FetchMode::Static).unwrap();
        let url = Url::parse(&format!("{}/", server.uri())).unwrap();

        let saved = downloader.fetch(&url, true, true, None).await.unwrap();
        let body = fs::read_to_string(&saved).unwrap();
        // Failed asset keeps its original reference
        assert!(body.contains(r#"src="/missing.png""#));
    }
}
