//! Per-host politeness rate limiting
//!
//! Enforces a minimum gap between request starts to the same host, shared
//! across all concurrent workers of a crawl.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Cooperative per-host rate limiter
///
/// Each host maps to the start time of its most recently reserved request
/// slot. A caller reserves its own slot inside the critical section (read the
/// last slot, compute `max(last + delay, now)`, write it back) and then sleeps
/// outside the lock until the reserved instant. Reserving under the lock means
/// two same-host callers can never compute overlapping windows from a stale
/// timestamp, and since the sleep happens after the lock is released,
/// requests to different hosts are never serialized against each other.
pub struct HostRateLimiter {
    delay: Duration,
    reserved: Mutex<HashMap<String, Instant>>,
}

impl HostRateLimiter {
    /// Creates a limiter enforcing `delay` between same-host request starts
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            reserved: Mutex::new(HashMap::new()),
        }
    }

    /// Blocks until this caller's reserved slot for `host` arrives
    pub async fn wait_turn(&self, host: &str) {
        if self.delay.is_zero() {
            return;
        }

        let slot = {
            let mut reserved = self.reserved.lock().unwrap();
            let now = Instant::now();
            let slot = match reserved.get(host) {
                Some(last) => (*last + self.delay).max(now),
                None => now,
            };
            reserved.insert(host.to_string(), slot);
            slot
        };

        let now = Instant::now();
        if slot > now {
            tracing::trace!("Rate limit: waiting {:?} for host {}", slot - now, host);
            tokio::time::sleep_until(tokio::time::Instant::from_std(slot)).await;
        }
    }
}
