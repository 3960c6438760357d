//! Robots.txt fetching, caching and enforcement
//!
//! The [`RobotsGate`] answers allow/deny for a URL + user-agent pair. Policies
//! are fetched lazily per origin and cached for the lifetime of the gate,
//! which is one crawl (a fresh gate is built per crawl, so a cached policy
//! never outlives the crawl that fetched it).

mod parser;

pub use parser::ParsedRobots;

use crate::url::origin_of;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

/// Allow/deny gate backed by per-origin robots.txt policies
///
/// Fail-open behavior: when robots.txt cannot be fetched (network error,
/// timeout, non-success status), the origin resolves to a permissive policy.
/// This mirrors standard robots-parser semantics and is deliberate; callers
/// must not rely on denial when the policy fetch itself fails.
pub struct RobotsGate {
    client: Client,
    respect: bool,
    cache: Mutex<HashMap<String, ParsedRobots>>,
}

impl RobotsGate {
    /// Creates a gate using the given HTTP client
    ///
    /// When `respect` is false every check answers allow without fetching.
    pub fn new(client: Client, respect: bool) -> Self {
        Self {
            client,
            respect,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Checks whether `url` may be fetched by `user_agent`
    pub async fn allowed(&self, url: &Url, user_agent: &str) -> bool {
        if !self.respect {
            return true;
        }

        let origin = origin_of(url);

        let cached = {
            let cache = self.cache.lock().unwrap();
            cache.get(&origin).cloned()
        };

        let policy = match cached {
            Some(policy) => policy,
            None => {
                let policy = self.fetch_policy(&origin).await;
                // Two workers racing on the same origin may both fetch; the
                // duplicate fetch is harmless and last-write-wins.
                let mut cache = self.cache.lock().unwrap();
                cache.insert(origin, policy.clone());
                policy
            }
        };

        policy.is_allowed(url.as_str(), user_agent)
    }

    /// Fetches and parses robots.txt for an origin
    async fn fetch_policy(&self, origin: &str) -> ParsedRobots {
        let robots_url = format!("{}/robots.txt", origin);
        tracing::debug!("Fetching robots.txt from {}", robots_url);

        match self.client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => ParsedRobots::from_content(&body),
                Err(e) => {
                    tracing::info!("Failed reading robots.txt body from {}: {}", robots_url, e);
                    ParsedRobots::allow_all()
                }
            },
            Ok(response) => {
                tracing::debug!(
                    "robots.txt at {} returned {}, treating as allow-all",
                    robots_url,
                    response.status()
                );
                ParsedRobots::allow_all()
            }
            Err(e) => {
                tracing::info!("Couldn't fetch robots.txt from {}: {}", robots_url, e);
                ParsedRobots::allow_all()
            }
        }
    }
}
