// src/services/cache.rs
use chrono::{DateTime, Duration, Utc};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

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

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: DateTime<Utc>,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.stored_at > self.ttl
    }
}

/// Process-local memoization keyed by request parameters.
///
/// Entries expire lazily: a read past the TTL drops the entry, and
/// `purge_expired` sweeps the rest. Nothing runs in the background.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        TtlCache {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                debug!("Cache entry expired: {}", key);
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            stored_at: self.clock.now(),
            ttl,
        };
        self.lock().insert(key.into(), entry);
    }

    /// Return the live entry for `key`, or store and return `make()`.
    /// The lookup and the insert happen under one lock.
    pub fn get_or_insert_with(&self, key: &str, make: impl FnOnce() -> V) -> (V, bool) {
        let now = self.clock.now();
        let mut entries = self.lock();
        if let Some(entry) = entries.get(key) {
            if !entry.is_expired(now) {
                return (entry.value.clone(), true);
            }
        }
        let value = make();
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.clone(),
                stored_at: now,
                ttl: self.default_ttl,
            },
        );
        (value, false)
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.lock().remove(key).map(|entry| entry.value)
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Drop every entry whose key matches; returns how many were removed.
    pub fn remove_matching(&self, matches: impl Fn(&str) -> bool) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| !matches(key));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn setup(ttl_secs: i64) -> (Arc<ManualClock>, TtlCache<u32>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let cache = TtlCache::new(Duration::seconds(ttl_secs), clock.clone());
        (clock, cache)
    }

    #[test]
    fn entry_survives_exactly_ttl_and_expires_after() {
        let (clock, cache) = setup(5);
        cache.set("k", 7);

        clock.advance(Duration::seconds(5));
        assert_eq!(cache.get("k"), Some(7));

        clock.advance(Duration::milliseconds(1));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty(), "expired entry is dropped on read");
    }

    #[test]
    fn per_entry_ttl_overrides_default() {
        let (clock, cache) = setup(3600);
        cache.set_with_ttl("short", 1, Duration::seconds(1));
        cache.set("long", 2);

        clock.advance(Duration::seconds(2));
        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[test]
    fn purge_sweeps_only_expired_entries() {
        let (clock, cache) = setup(10);
        cache.set("old", 1);
        clock.advance(Duration::seconds(8));
        cache.set("new", 2);
        clock.advance(Duration::seconds(3));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("new"), Some(2));
    }

    #[test]
    fn remove_matching_filters_by_key() {
        let (_, cache) = setup(10);
        cache.set("overview_a_1", 1);
        cache.set("overview_a_2", 2);
        cache.set("overview_b_1", 3);

        assert_eq!(cache.remove_matching(|key| key.starts_with("overview_a_")), 2);
        assert_eq!(cache.get("overview_b_1"), Some(3));
    }

    #[test]
    fn get_or_insert_reuses_live_entry() {
        let (clock, cache) = setup(5);
        assert_eq!(cache.get_or_insert_with("k", || 1), (1, false));
        assert_eq!(cache.get_or_insert_with("k", || 2), (1, true));

        clock.advance(Duration::seconds(6));
        assert_eq!(cache.get_or_insert_with("k", || 3), (3, false));
    }
}
