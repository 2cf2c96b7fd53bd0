use std::sync::Arc;

use quick_cache::sync::Cache;
use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::structs::Calendar;

const CAPACITY: usize = 256;

pub struct Config {
    pub enabled: bool,
    pub ttl: Duration,
}

/// Parsed calendars keyed by feed URL. Entries older than the TTL are stale
/// and dropped on lookup.
pub struct FeedCache {
    enabled: bool,
    inner: Cache<String, (Instant, Arc<Calendar>)>,
    ttl: Duration,
}

impl FeedCache {
    pub fn new(config: Config) -> Self {
        Self {
            enabled: config.enabled,
            ttl: config.ttl,
            inner: Cache::new(CAPACITY),
        }
    }

    pub fn insert(&self, url: String, calendar: Calendar) -> Arc<Calendar> {
        let arcd = Arc::new(calendar);
        if !self.enabled {
            return arcd;
        }

        self.inner.insert(url, (Instant::now(), Arc::clone(&arcd)));
        arcd
    }

    pub fn get(&self, url: &str) -> Option<Arc<Calendar>> {
        if !self.enabled {
            return None;
        }

        let (inserted, calendar) = self.inner.get(url)?;
        if inserted.elapsed() >= self.ttl {
            debug!("Evicting stale feed");
            self.inner.remove(url);
            return None;
        }

        Some(calendar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(enabled: bool, ttl: Duration) -> FeedCache {
        FeedCache::new(Config { enabled, ttl })
    }

    #[test]
    fn disabled_cache_never_hits() {
        let cache = cache(false, Duration::from_secs(3600));
        cache.insert("https://example.com/a.ics".into(), Calendar::default());
        assert!(cache.get("https://example.com/a.ics").is_none());
    }

    #[test]
    fn hits_by_url() {
        let cache = cache(true, Duration::from_secs(3600));
        let stored = cache.insert("https://example.com/a.ics".into(), Calendar::default());

        let hit = cache.get("https://example.com/a.ics").unwrap();
        assert!(Arc::ptr_eq(&stored, &hit));
        assert!(cache.get("https://example.com/b.ics").is_none());
    }

    #[test]
    fn stale_entries_miss() {
        let cache = cache(true, Duration::ZERO);
        cache.insert("https://example.com/a.ics".into(), Calendar::default());
        assert!(cache.get("https://example.com/a.ics").is_none());
    }
}
