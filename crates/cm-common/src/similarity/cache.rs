use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Cache key: the two normalized labels in lexicographic order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    left: String,
    right: String,
}

impl PairKey {
    pub fn ordered(a: &str, b: &str) -> Self {
        let (left, right) = if a <= b { (a, b) } else { (b, a) };
        Self {
            left: left.to_string(),
            right: right.to_string(),
        }
    }
}

/// Memo store for similarity scores. Values are immutable floats, so a lost race
/// only costs a recomputation.
pub trait SimilarityCache: Send + Sync {
    fn get(&self, key: &PairKey) -> Option<f64>;
    fn insert(&self, key: PairKey, score: f64);
    fn ttl(&self) -> Duration;
    /// Drop every entry, returning how many were held.
    fn clear(&self) -> usize;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl: Duration,
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(3600),
            capacity: 10_000,
        }
    }
}

impl CacheSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let enabled = std::env::var("CM_SIMILARITY_CACHE_ENABLED")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(defaults.enabled);
        let ttl = std::env::var("CM_SIMILARITY_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.ttl);
        let capacity = std::env::var("CM_SIMILARITY_CACHE_CAPACITY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|c| *c > 0)
            .unwrap_or(defaults.capacity);

        Self {
            enabled,
            ttl,
            capacity,
        }
    }
}

const EVICTION_BATCH_DIVISOR: usize = 10;

#[derive(Debug, Clone, Copy)]
struct Entry {
    score: f64,
    inserted_at: Instant,
    last_access: Instant,
}

/// Bounded in-memory cache with time-based expiry and least-recently-used eviction.
/// A full cache evicts a batch of its oldest entries at once, so the scan that finds
/// them runs once per `capacity / 10` inserts rather than on every insert.
#[derive(Debug)]
pub struct TtlCache {
    entries: DashMap<PairKey, Entry>,
    ttl: Duration,
    capacity: usize,
}

impl Default for TtlCache {
    fn default() -> Self {
        let settings = CacheSettings::default();
        Self::new(settings.ttl, settings.capacity)
    }
}

impl TtlCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        now.duration_since(entry.inserted_at) >= self.ttl
    }

    fn eviction_batch(&self) -> usize {
        (self.capacity / EVICTION_BATCH_DIVISOR).max(1)
    }

    fn make_room(&self, now: Instant) {
        self.entries.retain(|_, entry| !self.is_expired(entry, now));
        if self.entries.len() < self.capacity {
            return;
        }

        let mut by_access: Vec<(Instant, PairKey)> = self
            .entries
            .iter()
            .map(|item| (item.value().last_access, item.key().clone()))
            .collect();
        let victims = self.eviction_batch().min(by_access.len());
        if victims < by_access.len() {
            by_access.select_nth_unstable_by_key(victims, |(last_access, _)| *last_access);
            by_access.truncate(victims);
        }
        for (_, key) in by_access {
            self.entries.remove(&key);
        }
    }

    fn get_at(&self, key: &PairKey, now: Instant) -> Option<f64> {
        {
            let mut entry = self.entries.get_mut(key)?;
            if !self.is_expired(&entry, now) {
                entry.last_access = now;
                return Some(entry.score);
            }
        }

        self.entries.remove(key);
        None
    }

    fn insert_at(&self, key: PairKey, score: f64, now: Instant) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.make_room(now);
        }
        self.entries.insert(
            key,
            Entry {
                score,
                inserted_at: now,
                last_access: now,
            },
        );
    }
}

impl SimilarityCache for TtlCache {
    fn get(&self, key: &PairKey) -> Option<f64> {
        self.get_at(key, Instant::now())
    }

    fn insert(&self, key: PairKey, score: f64) {
        self.insert_at(key, score, Instant::now());
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }

    fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl SimilarityCache for NoopCache {
    fn get(&self, _key: &PairKey) -> Option<f64> {
        None
    }

    fn insert(&self, _key: PairKey, _score: f64) {}

    fn ttl(&self) -> Duration {
        Duration::ZERO
    }

    fn clear(&self) -> usize {
        0
    }

    fn len(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_is_order_independent() {
        assert_eq!(PairKey::ordered("b", "a"), PairKey::ordered("a", "b"));
    }

    #[test]
    fn returns_inserted_values_until_cleared() {
        let cache = TtlCache::new(Duration::from_secs(60), 10);
        cache.insert(PairKey::ordered("a", "b"), 0.5);

        assert_eq!(cache.get(&PairKey::ordered("b", "a")), Some(0.5));
        assert_eq!(cache.clear(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = TtlCache::new(Duration::ZERO, 10);
        cache.insert(PairKey::ordered("a", "b"), 0.5);

        assert_eq!(cache.get(&PairKey::ordered("a", "b")), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn evicts_least_recently_used_when_full() {
        let cache = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert(PairKey::ordered("a", "a"), 1.0);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(PairKey::ordered("b", "b"), 1.0);
        std::thread::sleep(Duration::from_millis(2));
        // touch "a" so "b" becomes the eviction victim
        assert!(cache.get(&PairKey::ordered("a", "a")).is_some());
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(PairKey::ordered("c", "c"), 1.0);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&PairKey::ordered("a", "a")).is_some());
        assert!(cache.get(&PairKey::ordered("b", "b")).is_none());
        assert!(cache.get(&PairKey::ordered("c", "c")).is_some());
    }

    #[test]
    fn full_cache_evicts_oldest_batch_then_fills_again() {
        let cache = TtlCache::new(Duration::from_secs(60), 20);
        let start = Instant::now();
        let at = |ms: u64| start + Duration::from_millis(ms);
        let key = |i: u64| PairKey::ordered(&format!("k{i}"), "x");

        for i in 0..20 {
            cache.insert_at(key(i), 0.5, at(i));
        }
        // k0 is read again, leaving k1 and k2 as the two least recently used
        assert!(cache.get_at(&key(0), at(30)).is_some());

        cache.insert_at(key(20), 0.5, at(31));
        assert_eq!(cache.len(), 19);
        assert!(cache.get_at(&key(1), at(32)).is_none());
        assert!(cache.get_at(&key(2), at(32)).is_none());
        assert!(cache.get_at(&key(0), at(32)).is_some());
        assert!(cache.get_at(&key(3), at(32)).is_some());

        cache.insert_at(key(21), 0.5, at(33));
        assert_eq!(cache.len(), 20);
    }

    #[test]
    fn noop_cache_never_hits() {
        let cache = NoopCache;
        cache.insert(PairKey::ordered("a", "b"), 0.3);
        assert_eq!(cache.get(&PairKey::ordered("a", "b")), None);
        assert!(cache.is_empty());
    }
}
