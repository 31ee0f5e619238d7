//! # Time-Bounded Envelope De-duplication
//!
//! Each subscription remembers the envelope IDs it has dispatched for a
//! bounded window, so a transport redelivery reaches the handler once.
//!
//! - IDs are remembered for `window` after first sight
//! - Expired IDs are garbage-collected every `gc_interval`
//! - Empty IDs are never treated as duplicates

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Remembers recently seen envelope IDs.
#[derive(Debug)]
pub struct RecentIdCache {
    /// Map of envelope ID -> instant it was first seen.
    cache: HashMap<String, Instant>,

    /// How long an ID is remembered.
    window: Duration,

    /// Last garbage collection.
    last_gc: Instant,

    /// Garbage collection interval.
    gc_interval: Duration,
}

impl RecentIdCache {
    /// Default memory window.
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(120);

    /// Default garbage collection interval.
    pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(10);

    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Self::DEFAULT_WINDOW, Self::DEFAULT_GC_INTERVAL)
    }

    #[must_use]
    pub fn with_config(window: Duration, gc_interval: Duration) -> Self {
        Self {
            cache: HashMap::new(),
            window,
            last_gc: Instant::now(),
            gc_interval,
        }
    }

    /// Record `id`, returning `false` if it was already seen within the window.
    pub fn check_and_insert(&mut self, id: &str) -> bool {
        if id.is_empty() {
            return true;
        }

        let now = Instant::now();

        if now.duration_since(self.last_gc) > self.gc_interval {
            self.garbage_collect(now);
            self.last_gc = now;
        }

        if let Some(seen) = self.cache.get(id) {
            if now.duration_since(*seen) < self.window {
                return false;
            }
        }

        self.cache.insert(id.to_string(), now);
        true
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.cache.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn garbage_collect(&mut self, now: Instant) {
        let window = self.window;
        self.cache
            .retain(|_, seen| now.duration_since(*seen) < window);
    }
}

impl Default for RecentIdCache {
    fn default() -> Self {
        Self::new()
    }
}
