//! Fixed-window request counters keyed by client identity.
//!
//! Counters live for the lifetime of the process. Each key is updated under its
//! map shard lock, so concurrent requests from one client never lose a hit.
//! A window resets lazily on the first request after it expires; idle keys are
//! evicted by [`RateLimiter::purge_expired`].

use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32, reset_after: Duration },
    Limited { reset_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    hits: u32,
}

/// Concurrency-safe fixed-window counter store.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Arc<DashMap<IpAddr, Window>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Arc::new(DashMap::new()),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Counts a request from `client` and decides whether to admit it.
    pub fn check(&self, client: IpAddr) -> Decision {
        let now = Instant::now();
        let mut entry = self.windows.entry(client).or_insert(Window {
            started: now,
            hits: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.hits = 0;
        }

        entry.hits = entry.hits.saturating_add(1);
        let reset_after = self
            .window
            .saturating_sub(now.duration_since(entry.started));

        if entry.hits > self.max_requests {
            Decision::Limited { reset_after }
        } else {
            Decision::Allowed {
                remaining: self.max_requests - entry.hits,
                reset_after,
            }
        }
    }

    /// Drops counters whose window has elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.duration_since(w.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    /// Number of clients with a live counter.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Spawns a task that purges expired counters once per window.
    pub fn spawn_janitor(&self) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(limiter.window);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = limiter.purge_expired();
                if removed > 0 {
                    tracing::debug!(removed, "Purged expired rate-limit windows");
                }
            }
        })
    }
}
