//! Static asset discovery, download and markup rewriting
//!
//! Assets are the `img[src]`, `script[src]` and stylesheet `link[href]`
//! references of a page. Discovery resolves them against the page URL and
//! deduplicates by absolute URL in first-occurrence order. Downloads are
//! soft-failure: a robots denial or fetch error for one asset is logged and
//! skipped without affecting the page fetch.

use crate::robots::RobotsGate;
use crate::url::asset_local_path;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Total attempts for one asset fetch
const ASSET_FETCH_ATTEMPTS: u32 = 3;

/// Backoff ceiling between asset fetch attempts
const ASSET_MAX_BACKOFF: Duration = Duration::from_secs(8);

/// One discovered asset: its absolute URL plus every raw attribute value
/// in the markup that resolved to it
#[derive(Debug, Clone)]
pub struct Asset {
    pub url: Url,
    pub refs: Vec<String>,
}

/// Extracts asset candidates from markup, resolved and deduplicated
///
/// Candidates are `img[src]`, `script[src]` and `link[rel~=stylesheet][href]`
/// in document order. Relative references are resolved against `base_url`;
/// unparseable ones are dropped. The result is deduplicated by absolute URL,
/// preserving first-occurrence order, with all raw references that mapped to
/// each URL retained for rewriting. No origin-based filtering happens here.
pub fn resolve_assets(html: &str, base_url: &Url) -> Vec<Asset> {
    let selector = match Selector::parse(r#"img[src], script[src], link[rel~="stylesheet"][href]"#)
    {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let document = Html::parse_document(html);
    let mut assets: Vec<Asset> = Vec::new();
    let mut index_by_url: HashMap<Url, usize> = HashMap::new();

    for element in document.select(&selector) {
        let attr = match element.value().name() {
            "link" => "href",
            _ => "src",
        };
        let raw = match element.value().attr(attr) {
            Some(value) if !value.trim().is_empty() => value.trim(),
            _ => continue,
        };
        let resolved = match base_url.join(raw) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Skipping unresolvable asset ref {:?}: {}", raw, e);
                continue;
            }
        };

        match index_by_url.get(&resolved) {
            Some(&i) => {
                let refs = &mut assets[i].refs;
                if !refs.iter().any(|r| r == raw) {
                    refs.push(raw.to_string());
                }
            }
            None => {
                index_by_url.insert(resolved.clone(), assets.len());
                assets.push(Asset {
                    url: resolved,
                    refs: vec![raw.to_string()],
                });
            }
        }
    }

    assets
}

/// Fetches assets and persists them under `{output_dir}/assets/{host}/`
pub struct AssetDownloader {
    client: Client,
    robots: Arc<RobotsGate>,
    output_dir: PathBuf,
    user_agent: String,
}

impl AssetDownloader {
    pub fn new(
        client: Client,
        robots: Arc<RobotsGate>,
        output_dir: PathBuf,
        user_agent: String,
    ) -> Self {
        Self {
            client,
            robots,
            output_dir,
            user_agent,
        }
    }

    /// Downloads one asset, returning its local path
    ///
    /// Returns None when robots.txt denies the asset (logged, non-fatal) or
    /// when fetching/writing fails after the retry budget. A partial file
    /// from an interrupted stream is removed rather than left behind.
    pub async fn download(&self, url: &Url) -> Option<PathBuf> {
        if !self.robots.allowed(url, &self.user_agent).await {
            tracing::debug!("Skipping asset disallowed by robots: {}", url);
            return None;
        }

        let mut response = None;
        for attempt in 0..ASSET_FETCH_ATTEMPTS {
            let result = self
                .client
                .get(url.as_str())
                .send()
                .await
                .and_then(|r| r.error_for_status());
            match result {
                Ok(r) => {
                    response = Some(r);
                    break;
                }
                Err(e) => {
                    if attempt + 1 == ASSET_FETCH_ATTEMPTS {
                        tracing::debug!("Failed to fetch asset {}: {}", url, e);
                        return None;
                    }
                    tokio::time::sleep(asset_backoff(attempt)).await;
                }
            }
        }
        let mut response = response?;

        let target = asset_local_path(&self.output_dir, url);
        if let Some(parent) = target.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::debug!("Failed to create asset dir {}: {}", parent.display(), e);
                return None;
            }
        }

        let mut file = match fs::File::create(&target) {
            Ok(f) => f,
            Err(e) => {
                tracing::debug!("Failed to create asset file {}: {}", target.display(), e);
                return None;
            }
        };

        // Stream the body; an empty chunk means end-of-stream, not an error.
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if chunk.is_empty() {
                        break;
                    }
                    if let Err(e) = file.write_all(&chunk) {
                        tracing::debug!("Failed writing asset {}: {}", target.display(), e);
                        let _ = fs::remove_file(&target);
                        return None;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("Stream error for asset {}: {}", url, e);
                    let _ = fs::remove_file(&target);
                    return None;
                }
            }
        }

        tracing::info!("Saved asset {} -> {}", url, target.display());
        Some(target)
    }

    /// Downloads all assets without touching the markup
    ///
    /// Sleeps `delay` between downloads as a courtesy to the asset hosts.
    pub async fn download_all(&self, assets: &[Asset], delay: Duration) {
        for asset in assets {
            self.download(&asset.url).await;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Downloads assets and rewrites the markup to reference local copies
    ///
    /// Every raw attribute value that resolved to a successfully downloaded
    /// asset is replaced with the saved file's path relative to the output
    /// root, using forward slashes regardless of platform. Assets that fail
    /// to download keep their original references. Sleeps `delay` between
    /// downloads, same as [`AssetDownloader::download_all`].
    pub async fn download_and_rewrite(&self, html: &str, assets: &[Asset], delay: Duration) -> String {
        let mut rewritten = html.to_string();

        for asset in assets {
            let local = match self.download(&asset.url).await {
                Some(path) => path,
                None => continue,
            };
            let relative = relative_forward_slashes(&local, &self.output_dir);
            for raw in &asset.refs {
                rewritten = rewritten
                    .replace(&format!("\"{}\"", raw), &format!("\"{}\"", relative))
                    .replace(&format!("'{}'", raw), &format!("'{}'", relative));
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        rewritten
    }
}

/// Delay before retrying a failed asset fetch (attempt counted from 0)
fn asset_backoff(attempt: u32) -> Duration {
    let delay = 1u64
        .checked_shl(attempt)
        .map(Duration::from_secs)
        .unwrap_or(ASSET_MAX_BACKOFF);
    delay.min(ASSET_MAX_BACKOFF)
}

/// Renders `path` relative to `root` with forward slashes
fn relative_forward_slashes(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
