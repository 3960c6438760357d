//! HTTP fetcher implementation
//!
//! Builds the HTTP client and performs static page fetches with retry,
//! exponential backoff and user-agent rotation.

use crate::config::BasicAuth;
use crate::{GrabError, Result};
use reqwest::header::USER_AGENT;
use reqwest::{Client, Proxy};
use std::time::Duration;
use url::Url;

/// Default user-agent used when the caller supplies none
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// User-agents rotated across retry attempts to work around naive blocking
const USER_AGENT_POOL: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Total attempts for a static page fetch
pub const PAGE_FETCH_ATTEMPTS: u32 = 8;

/// Backoff ceiling between attempts
const MAX_BACKOFF: Duration = Duration::from_secs(16);

/// Builds an HTTP client with the crawler's standard configuration
///
/// # Arguments
///
/// * `user_agent` - Default user-agent header for all requests
/// * `timeout` - Per-request timeout
/// * `proxy` - Optional HTTP/HTTPS proxy URL applied to all requests
pub fn build_http_client(
    user_agent: &str,
    timeout: Duration,
    proxy: Option<&str>,
) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    if let Some(proxy_url) = proxy {
        builder = builder.proxy(Proxy::all(proxy_url)?);
    }

    Ok(builder.build()?)
}

/// Delay before retrying after a failed attempt (attempt counted from 0)
///
/// Exponential: 1s, 2s, 4s, 8s, then capped at 16s.
pub fn backoff_delay(attempt: u32) -> Duration {
    let secs = 1u64
        .checked_shl(attempt)
        .map(Duration::from_secs)
        .unwrap_or(MAX_BACKOFF);
    secs.min(MAX_BACKOFF)
}

/// Fetches a page body over plain HTTP with retry and backoff
///
/// Any transport-level failure (connection error, timeout, non-2xx status,
/// body read error) is retried up to [`PAGE_FETCH_ATTEMPTS`] total attempts.
/// When no explicit user-agent was configured the request's user-agent is
/// rotated through a small pool, cycling by attempt number. Exhausting the
/// budget surfaces [`GrabError::Transport`]; there is no silent empty-content
/// fallback.
pub async fn fetch_static(
    client: &Client,
    url: &Url,
    user_agent: Option<&str>,
    auth: Option<&BasicAuth>,
) -> Result<String> {
    for attempt in 0..PAGE_FETCH_ATTEMPTS {
        let ua = user_agent
            .unwrap_or_else(|| USER_AGENT_POOL[attempt as usize % USER_AGENT_POOL.len()]);

        let mut request = client.get(url.as_str()).header(USER_AGENT, ua);
        if let Some(credentials) = auth {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        tracing::debug!(
            "Attempt {}/{} for {}",
            attempt + 1,
            PAGE_FETCH_ATTEMPTS,
            url
        );

        let outcome = match request.send().await {
            Ok(response) => match response.error_for_status() {
                Ok(response) => response.text().await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        match outcome {
            Ok(body) => return Ok(body),
            Err(e) => {
                if attempt + 1 == PAGE_FETCH_ATTEMPTS {
                    tracing::warn!(
                        "Giving up on {} after {} attempts: {}",
                        url,
                        PAGE_FETCH_ATTEMPTS,
                        e
                    );
                    return Err(GrabError::Transport {
                        url: url.to_string(),
                        attempts: PAGE_FETCH_ATTEMPTS,
                        source: e,
                    });
                }
                let delay = backoff_delay(attempt);
                tracing::debug!(
                    "Attempt {} for {} failed ({}), retrying in {:?}",
                    attempt + 1,
                    url,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    unreachable!("retry loop returns on final attempt")
}
