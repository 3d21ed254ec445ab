//! Fixed-window rate limiter backed by DashMap: one counter per key with a
//! reset timestamp. Constructed once and injected into the handlers that
//! need it — never ambient module state — so its lifetime and test
//! isolation stay explicit.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use funnel_core::config::RateLimitConfig;
use serde::Serialize;

/// Per-key window state.
#[derive(Debug, Clone)]
struct WindowEntry {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Result returned by `check`.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// In-memory fixed-window limiter. Concurrent increments on the same key
/// race safely: the sharded map's entry lock serializes them.
pub struct FixedWindowLimiter {
    entries: DashMap<String, WindowEntry>,
    max_requests: u32,
    window: Duration,
}

impl FixedWindowLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            entries: DashMap::new(),
            max_requests: config.max_requests,
            window: Duration::seconds(config.window_secs as i64),
        }
    }

    /// Check (and consume) one request for `key`.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let now = Utc::now();

        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| WindowEntry {
                count: 0,
                reset_at: now + self.window,
            });

        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + self.window;
        }

        if entry.count < self.max_requests {
            entry.count += 1;
            RateLimitDecision {
                allowed: true,
                remaining: self.max_requests - entry.count,
                reset_at: entry.reset_at,
            }
        } else {
            RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at: entry.reset_at,
            }
        }
    }

    /// Current count for a key, if it has a live window.
    pub fn usage(&self, key: &str) -> Option<u32> {
        self.entries.get(key).map(|e| e.count)
    }
}
