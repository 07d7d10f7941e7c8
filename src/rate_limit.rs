//! Per-identity sliding-window rate limiting
//!
//! Each check prunes timestamps older than `now - window`, appends the
//! current instant, and compares the resulting count to the limit. Checking
//! therefore consumes a request slot; it is deliberately not idempotent.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::time::{Duration, Instant};

/// Limits applied by the sliding window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// Maximum requests allowed inside the trailing window
    pub max_requests: usize,
    /// Trailing window length
    pub window: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
        }
    }
}

/// Sliding-window request counter keyed by caller identity
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    settings: RwLock<RateLimitSettings>,
    windows: DashMap<String, Vec<Instant>>,
}

impl SlidingWindowLimiter {
    /// Create a limiter with the given settings
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
            windows: DashMap::new(),
        }
    }

    /// Current settings
    pub fn settings(&self) -> RateLimitSettings {
        *self.settings.read()
    }

    /// Replace the limiter settings.
    ///
    /// Existing windows keep their recorded timestamps; the new limit applies
    /// from the next check.
    pub fn update_settings(&self, settings: RateLimitSettings) {
        *self.settings.write() = settings;
    }

    /// Record one request for `identity` and report whether it is allowed.
    ///
    /// The DashMap entry guard gives exclusive access to the identity's
    /// window, so two racing requests from one identity cannot lose updates.
    pub fn check(&self, identity: &str) -> bool {
        let RateLimitSettings {
            max_requests,
            window,
        } = *self.settings.read();

        let now = Instant::now();
        let mut entry = self.windows.entry(identity.to_string()).or_default();

        entry.retain(|t| now.duration_since(*t) < window);
        entry.push(now);

        entry.len() <= max_requests
    }

    /// Requests currently recorded inside the window for `identity`
    pub fn current_count(&self, identity: &str) -> usize {
        let window = self.settings.read().window;
        let now = Instant::now();
        self.windows
            .get(identity)
            .map(|e| {
                e.iter()
                    .filter(|t| now.duration_since(**t) < window)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Drop all recorded state for `identity`
    pub fn reset(&self, identity: &str) {
        self.windows.remove(identity);
    }
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new(RateLimitSettings::default())
    }
}
