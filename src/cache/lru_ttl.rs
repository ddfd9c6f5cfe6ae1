//! Generic LRU cache with a per-entry TTL, shared by the postings, document
//! and query caches. `Get` returns the cached value or runs the loader,
//! inserts, and returns; an entry older than its TTL is treated as a miss
//! and reloaded on next access. All operations serialize under one mutex —
//! callers must not rely on concurrent loads of different keys overlapping.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

struct Entry<V> {
    value: V,
    born: Instant,
}

pub struct LruTtlCache<K, V> {
    inner: Mutex<LruCache<K, Entry<V>>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> LruTtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = std::num::NonZeroUsize::new(capacity.max(1)).unwrap();
        LruTtlCache {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached value for `key`, or call `loader`, insert the
    /// result, and return it. A live entry older than the cache's TTL is
    /// discarded and reloaded exactly once.
    pub fn get_or_load<F, E>(&self, key: &K, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        {
            let mut inner = self.inner.lock();
            if let Some(entry) = inner.get(key) {
                if entry.born.elapsed() < self.ttl {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(entry.value.clone());
                }
                inner.pop(key);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = loader()?;
        let mut inner = self.inner.lock();
        inner.put(
            key.clone(),
            Entry { value: value.clone(), born: Instant::now() },
        );
        Ok(value)
    }

    pub fn del(&self, key: &K) {
        self.inner.lock().pop(key);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Hit rate in `[0, 1]`; `0.0` if the cache has never been queried.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn caches_at_most_capacity_distinct_keys() {
        let cache: LruTtlCache<u32, u32> = LruTtlCache::new(2, Duration::from_secs(60));
        for k in 0..5u32 {
            let _: Result<u32, ()> = cache.get_or_load(&k, || Ok(k));
        }
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn loader_runs_exactly_once_per_key_within_ttl() {
        let cache: LruTtlCache<&str, u32> = LruTtlCache::new(4, Duration::from_secs(60));
        let calls = Cell::new(0);
        for _ in 0..5 {
            let _: Result<u32, ()> = cache.get_or_load(&"k", || {
                calls.set(calls.get() + 1);
                Ok(42)
            });
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn expired_entry_invokes_loader_again() {
        let cache: LruTtlCache<&str, u32> = LruTtlCache::new(4, Duration::from_millis(1));
        let _: Result<u32, ()> = cache.get_or_load(&"k", || Ok(1));
        std::thread::sleep(Duration::from_millis(5));
        let calls = Cell::new(0);
        let got: Result<u32, ()> = cache.get_or_load(&"k", || {
            calls.set(calls.get() + 1);
            Ok(2)
        });
        assert_eq!(got.unwrap(), 2);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn del_removes_entry() {
        let cache: LruTtlCache<&str, u32> = LruTtlCache::new(4, Duration::from_secs(60));
        let _: Result<u32, ()> = cache.get_or_load(&"k", || Ok(1));
        cache.del(&"k");
        assert!(cache.is_empty());
    }
}
