//! In-memory article cache with a fixed lifetime per entry.
//!
//! Entries expire lazily: a lookup that finds a stale entry removes it and
//! reports a miss. `purge_expired` (and the optional sweeper task) only
//! reclaims memory, it never changes what `get` returns.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use log::{debug, info};
use std::sync::Arc;
#[cfg(test)]
use std::sync::Mutex;

use crate::model::Article;

pub const DEFAULT_TTL_SECS: i64 = 15 * 60;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used to drive expiry in tests.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub articles: Arc<[Article]>,
    pub stored_at: DateTime<Utc>,
}

pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stored entries, including stale ones nobody has looked up yet.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.stored_at <= self.ttl
    }

    pub fn get(&self, key: &str) -> Option<Arc<[Article]>> {
        self.lookup(key).map(|entry| entry.articles)
    }

    /// Like `get`, but also returns when the entry was stored.
    pub fn lookup(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now();

        // the shard guard must be released before removing
        match self.entries.get(key) {
            None => return None,
            Some(entry) if self.is_fresh(&entry, now) => {
                debug!("Cache hit for key: {}", key);
                return Some(entry.value().clone());
            }
            Some(_) => {}
        }

        // a concurrent put may have refreshed the key in between
        if self
            .entries
            .remove_if(key, |_, entry| !self.is_fresh(entry, now))
            .is_some()
        {
            debug!("Cache expired for key: {}", key);
        }
        None
    }

    pub fn put(&self, key: impl Into<String>, articles: impl Into<Arc<[Article]>>) {
        self.store(key, articles);
    }

    /// Inserts or replaces the entry for `key` and returns what was stored.
    pub fn store(&self, key: impl Into<String>, articles: impl Into<Arc<[Article]>>) -> CacheEntry {
        let key = key.into();
        let entry = CacheEntry {
            articles: articles.into(),
            stored_at: self.clock.now(),
        };
        debug!("Cached {} articles for key: {}", entry.articles.len(), key);
        self.entries.insert(key, entry.clone());
        entry
    }

    /// Returns true if an entry was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            info!("Cache entry cleared for key: {}", key);
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
        info!("Cache cleared");
    }

    /// Drops every stale entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| self.is_fresh(entry, now));
        before.saturating_sub(self.entries.len())
    }
}

/// Periodically purges stale entries. A zero interval disables the sweeper.
pub fn spawn_sweeper(
    cache: Arc<ResponseCache>,
    interval: std::time::Duration,
) -> Option<tokio::task::JoinHandle<()>> {
    if interval.is_zero() {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = cache.purge_expired();
            if removed > 0 {
                debug!("Sweeper removed {} expired entries", removed);
            }
        }
    }))
}
