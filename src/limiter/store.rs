use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Counter state of one key inside its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    pub hits: u32,
    pub window_start: Instant,
}

impl WindowCount {
    pub fn expired(&self, window: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= window
    }

    /// Time left until the window closes.
    pub fn time_left(&self, window: Duration, now: Instant) -> Duration {
        window.saturating_sub(now.saturating_duration_since(self.window_start))
    }
}

/// Backing store for fixed-window counters.
///
/// The in-process [`MemoryStore`] gives every process its own counters; a
/// deployment behind a load balancer plugs in a shared implementation here
/// (atomic increment-and-expire keyed the same way).
#[async_trait]
pub trait RateLimitStore: Send + Sync + std::fmt::Debug {
    /// Records one hit for `key`, opening a new window if the previous one expired.
    async fn increment(&self, key: &str, window: Duration, now: Instant) -> WindowCount;

    /// Current window for `key` without recording a hit. `None` if there is
    /// no open window.
    async fn peek(&self, key: &str, window: Duration, now: Instant) -> Option<WindowCount>;

    /// Drops expired windows, returning how many were removed.
    async fn sweep(&self, window: Duration, now: Instant) -> usize;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    counters: DashMap<String, WindowCount>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn increment(&self, key: &str, window: Duration, now: Instant) -> WindowCount {
        let mut entry = self.counters.entry(key.to_string()).or_insert(WindowCount {
            hits: 0,
            window_start: now,
        });
        if entry.expired(window, now) {
            *entry = WindowCount {
                hits: 0,
                window_start: now,
            };
        }
        entry.hits = entry.hits.saturating_add(1);
        *entry
    }

    async fn peek(&self, key: &str, window: Duration, now: Instant) -> Option<WindowCount> {
        self.counters
            .get(key)
            .map(|count| *count)
            .filter(|count| !count.expired(window, now))
    }

    async fn sweep(&self, window: Duration, now: Instant) -> usize {
        let before = self.counters.len();
        self.counters.retain(|_, count| !count.expired(window, now));
        before.saturating_sub(self.counters.len())
    }
}
