//! Request guard: per-client rate limiting and body-size limits.
//!
//! The guard runs before any pipeline work. Its only shared state is the
//! limiter's map of client → recent request instants, held behind one
//! mutex so that checking the quota and recording the request happen in a
//! single critical section. Two concurrent requests from the same client can
//! never both take the last slot.
//!
//! State is in memory and per process. [`RateLimitStore`] is the seam for a
//! shared store when running several replicas.

use crate::config::RateLimitConfig;
use crate::error::ExplainError;
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Purge idle clients once the map holds more entries than this.
const PURGE_THRESHOLD: usize = 4096;

/// Outcome of a quota check, with the numbers for `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the oldest counted request leaves the window.
    pub reset_after: Duration,
}

impl RateDecision {
    /// Whole seconds until the client may retry, never zero when denied.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs() + u64::from(self.reset_after.subsec_nanos() > 0);
        if self.allowed {
            secs
        } else {
            secs.max(1)
        }
    }
}

/// A store that can atomically check and record one request.
pub trait RateLimitStore: Send + Sync {
    fn check_and_record(&self, client: &str, now: Instant) -> RateDecision;
}

/// Sliding-window counter: at most `max_requests` per `window` per client.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_requests: u32,
    window: Duration,
    entries: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    /// Drop clients with no request inside the window.
    pub fn purge_idle(&self, now: Instant) {
        let mut map = self.lock();
        let before = map.len();
        map.retain(|_, q| q.back().is_some_and(|t| now.duration_since(*t) < self.window));
        debug!("Rate limiter purged {} idle clients", before - map.len());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        // A panic while holding the lock cannot leave the map inconsistent
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl RateLimitStore for SlidingWindowLimiter {
    fn check_and_record(&self, client: &str, now: Instant) -> RateDecision {
        let mut map = self.lock();

        if map.len() > PURGE_THRESHOLD {
            let window = self.window;
            map.retain(|_, q| q.back().is_some_and(|t| now.duration_since(*t) < window));
        }

        let queue = map.entry(client.to_string()).or_default();
        while queue
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            queue.pop_front();
        }

        let used = queue.len() as u32;
        let allowed = used < self.max_requests;
        if allowed {
            queue.push_back(now);
        }

        let reset_after = queue
            .front()
            .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
            .unwrap_or(self.window);
        let remaining = self
            .max_requests
            .saturating_sub(used + u32::from(allowed));

        RateDecision {
            allowed,
            limit: self.max_requests,
            remaining,
            reset_after,
        }
    }
}

/// Applies the rate limit and body-size limit to incoming requests.
#[derive(Clone)]
pub struct RequestGuard {
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
}

impl RequestGuard {
    pub fn new(config: RateLimitConfig) -> Self {
        let store = Arc::new(SlidingWindowLimiter::from_config(&config));
        Self { store, config }
    }

    /// Use a custom store (e.g. shared between replicas).
    pub fn with_store(config: RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count one request from `client` and check its body size.
    ///
    /// The request is counted before the size check so that oversized
    /// bodies consume quota too.
    pub fn admit(&self, client: &str, body_len: u64) -> Result<RateDecision, ExplainError> {
        self.admit_at(client, body_len, Instant::now())
    }

    pub fn admit_at(
        &self,
        client: &str,
        body_len: u64,
        now: Instant,
    ) -> Result<RateDecision, ExplainError> {
        let decision = self.store.check_and_record(client, now);
        if !decision.allowed {
            warn!(
                "Rate limit exceeded for client {} ({} per {}s)",
                client, decision.limit, self.config.window_secs
            );
            return Err(ExplainError::RateLimited {
                limit: decision.limit,
                window_secs: self.config.window_secs,
                retry_after_secs: decision.retry_after_secs(),
            });
        }
        if body_len > self.config.max_body_bytes {
            return Err(ExplainError::PayloadTooLarge {
                what: "Request body".into(),
                limit_bytes: self.config.max_body_bytes,
            });
        }
        Ok(decision)
    }
}

impl Default for RequestGuard {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

/// Derive the client key used for rate limiting.
///
/// Order: first `X-Forwarded-For` entry, `X-Real-IP`, `CF-Connecting-IP`,
/// the socket peer address, then `"unknown"`. `header` looks up a header
/// by lowercase name.
pub fn client_identity<'a>(
    header: impl Fn(&str) -> Option<&'a str>,
    peer: Option<IpAddr>,
) -> String {
    let forwarded = header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim);
    [forwarded, header("x-real-ip"), header("cf-connecting-ip")]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|ip| ip.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}
