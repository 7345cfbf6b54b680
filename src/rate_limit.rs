//! Fixed-window request limiting keyed by client IP.
//!
//! State lives in process memory, so separate instances of the service each
//! count independently. One limiter is built at startup and shared through
//! `AppState`.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use rand_core::{OsRng, RngCore};

pub const DEFAULT_MAX_REQUESTS: u32 = 10;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// One in this many calls sweeps expired windows out of the map.
const SWEEP_ONE_IN: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    resets_at: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, key: &str) -> RateLimitDecision {
        let now = Instant::now();
        if OsRng.next_u32() % SWEEP_ONE_IN == 0 {
            self.sweep(now);
        }
        self.check_at(key, now)
    }

    /// Counts one request for `key` at `now`. The lookup and the increment
    /// happen under a single lock.
    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let mut windows = self.windows.lock();

        match windows.get_mut(key) {
            Some(window) if now <= window.resets_at => {
                if window.count >= self.max_requests {
                    return self.decision(false, 0);
                }
                window.count += 1;
                self.decision(true, self.max_requests - window.count)
            }
            _ => {
                windows.insert(
                    key.to_string(),
                    Window {
                        count: 1,
                        resets_at: now + self.window,
                    },
                );
                self.decision(true, self.max_requests.saturating_sub(1))
            }
        }
    }

    /// Drops windows that have already reset.
    pub fn sweep(&self, now: Instant) {
        self.windows.lock().retain(|_, window| now <= window.resets_at);
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().len()
    }

    fn decision(&self, allowed: bool, remaining: u32) -> RateLimitDecision {
        RateLimitDecision {
            allowed,
            limit: self.max_requests,
            remaining,
        }
    }
}
