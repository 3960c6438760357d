//! URL helpers for filename derivation and host scoping
//!
//! This module owns every mapping from URLs to on-disk locations and to the
//! host/origin keys used for rate limiting and robots.txt scoping.

use std::path::{Path, PathBuf};
use url::Url;

/// Returns the `host[:port]` component of a URL
///
/// Used as the key for per-host rate limiting and same-domain checks.
pub fn netloc(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Returns `host[:port]` with colons replaced by underscores
///
/// Colons are not valid in filenames on every platform, so this form is used
/// wherever a host becomes part of a path.
pub fn safe_host(url: &Url) -> String {
    netloc(url).replace(':', "_")
}

/// Returns the `scheme://host[:port]` origin of a URL
///
/// The origin is the scoping unit for robots.txt policies.
pub fn origin_of(url: &Url) -> String {
    format!("{}://{}", url.scheme(), netloc(url))
}

/// Derives the on-disk path for a saved page
///
/// When `custom` is given, the page is saved as `{output_dir}/{custom}`, with
/// `.html` appended only if the name has no extension. Otherwise the filename
/// is derived from the URL as `{safe_host}_{path}`, where the path is stripped
/// of leading/trailing slashes (defaulting to `index` when empty) and `.html`
/// is appended only when the derived name contains no `.`.
///
/// Known limitation: distinct URLs that differ only in their query string map
/// to the same filename, so a later fetch overwrites an earlier one. This
/// mirrors the deterministic naming scheme callers and tests depend on and is
/// deliberately not disambiguated by hashing.
pub fn page_filename(output_dir: &Path, url: &Url, custom: Option<&str>) -> PathBuf {
    if let Some(name) = custom {
        let mut path = output_dir.join(name);
        if path.extension().is_none() {
            path.set_extension("html");
        }
        return path;
    }

    let host = safe_host(url);
    let trimmed = url.path().trim_matches('/');
    let page_path = if trimmed.is_empty() { "index" } else { trimmed };

    if page_path.contains('.') {
        output_dir.join(format!("{}_{}", host, page_path))
    } else {
        output_dir.join(format!("{}_{}.html", host, page_path))
    }
}

/// Derives the local save path for an asset URL
///
/// Assets land under `{output_dir}/assets/{safe_host}/{basename}`, where the
/// basename is the final segment of the URL path, defaulting to `unnamed`
/// when the path has no filename component.
pub fn asset_local_path(output_dir: &Path, url: &Url) -> PathBuf {
    let basename = url
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|segment| !segment.is_empty())
        .unwrap_or("unnamed");

    output_dir.join("assets").join(safe_host(url)).join(basename)
}

/// Normalizes a seed URL string before crawling
///
/// Trims surrounding whitespace and prepends `https://` when no scheme is
/// present, then parses the result.
pub fn normalize_seed(raw: &str) -> Result<Url, url::ParseError> {
    let trimmed = raw.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("https://{}", trimmed))
    }
}
