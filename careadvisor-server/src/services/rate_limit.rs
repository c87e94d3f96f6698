//! Per-user fixed-window rate limiting.
//!
//! Each identity gets a counter and a window expiry. The check-then-increment
//! runs under one lock acquisition, so two concurrent requests can never both
//! claim the last slot. A fixed window admits up to the ceiling immediately
//! after each reset, so bursts of up to twice the ceiling can straddle a
//! window boundary; the ceiling still holds within any single window.

use async_trait::async_trait;
use shared::config::server::LimitsConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The request was counted and may proceed.
    Allowed { remaining: u32 },
    /// Quota exhausted; retry after the given number of seconds.
    Denied { retry_after: u64 },
}

/// Admission control keyed by user identity.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check and, if allowed, consume one slot for `identity`.
    async fn check(&self, identity: &str) -> RateDecision;
}

#[derive(Debug)]
struct WindowEntry {
    count: u32,
    window_reset_at: Instant,
}

/// In-memory fixed-window limiter.
///
/// State lives in this process only; a multi-instance deployment would put a
/// shared store behind the [`RateLimiter`] trait instead.
pub struct FixedWindowLimiter {
    max_requests: u32,
    window: Duration,
    entries: Mutex<HashMap<String, WindowEntry>>,
}

impl FixedWindowLimiter {
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn from_config(limits: &LimitsConfig) -> Self {
        Self::new(
            limits.requests_per_minute,
            Duration::from_secs(limits.window_seconds),
        )
    }

    /// Admission check against an explicit clock reading. Tests drive this
    /// directly to simulate window expiry.
    async fn check_at(&self, identity: &str, now: Instant) -> RateDecision {
        let mut entries = self.entries.lock().await;

        match entries.get_mut(identity) {
            Some(entry) if now < entry.window_reset_at => {
                if entry.count >= self.max_requests {
                    let retry_after =
                        entry.window_reset_at.duration_since(now).as_secs().max(1);
                    RateDecision::Denied { retry_after }
                } else {
                    entry.count += 1;
                    RateDecision::Allowed {
                        remaining: self.max_requests - entry.count,
                    }
                }
            }
            _ => {
                entries.insert(
                    identity.to_string(),
                    WindowEntry {
                        count: 1,
                        window_reset_at: now + self.window,
                    },
                );
                RateDecision::Allowed {
                    remaining: self.max_requests.saturating_sub(1),
                }
            }
        }
    }

    /// Drops entries whose window expired more than `grace` ago.
    async fn evict_expired_at(&self, grace: Duration, now: Instant) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| now < entry.window_reset_at + grace);
        before - entries.len()
    }

    /// Spawns the periodic eviction sweep for stale identities.
    pub fn spawn_sweep(self: &Arc<Self>, interval: Duration, grace: Duration) {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = limiter.evict_expired_at(grace, Instant::now()).await;
                if removed > 0 {
                    debug!(removed, "evicted stale rate-limit entries");
                }
            }
        });
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn check(&self, identity: &str) -> RateDecision {
        self.check_at(identity, Instant::now()).await
    }
}
