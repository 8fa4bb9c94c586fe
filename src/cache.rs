//! Time-to-live cache for upstream data shared across requests.
//!
//! Built once in `main` and carried in the API state. A refresh replaces the
//! cached `Arc` in a single swap, so readers see either the old value or the
//! new one, never a partial write. Two requests racing past an expired entry
//! may both fetch; the last write wins.

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct Entry<T> {
    value: Arc<T>,
    fetched_at: Instant,
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Entry {
            value: Arc::clone(&self.value),
            fetched_at: self.fetched_at,
        }
    }
}

pub struct TtlCache<T> {
    name: &'static str,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    slot: RwLock<Option<Entry<T>>>,
}

impl<T: Send + Sync> TtlCache<T> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self::with_clock(name, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(name: &'static str, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        TtlCache {
            name,
            ttl,
            clock,
            slot: RwLock::new(None),
        }
    }

    /// The cached value if it is still fresh.
    pub fn get(&self) -> Option<Arc<T>> {
        let entry = self.slot.read().ok()?.clone()?;
        if self.clock.now().saturating_duration_since(entry.fetched_at) < self.ttl {
            Some(entry.value)
        } else {
            None
        }
    }

    pub fn put(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        let entry = Entry {
            value: Arc::clone(&value),
            fetched_at: self.clock.now(),
        };
        match self.slot.write() {
            Ok(mut slot) => *slot = Some(entry),
            Err(poisoned) => *poisoned.into_inner() = Some(entry),
        }
        value
    }

    /// Return the fresh cached value, or run `fetch` and cache its result.
    /// A failed fetch leaves the previous entry untouched.
    pub async fn get_or_fetch<E, F, Fut>(&self, fetch: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(v) = self.get() {
            debug!("[{} cache] using cached data", self.name);
            return Ok(v);
        }
        debug!("[{} cache] fetching new data", self.name);
        let value = fetch().await?;
        Ok(self.put(value))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Clock that only moves when told to.
    pub struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            ManualClock {
                now: Mutex::new(Instant::now()),
            }
        }

        pub fn advance(&self, d: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += d;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    #[tokio::test]
    async fn serves_cached_value_until_ttl_expires() {
        let clock = Arc::new(ManualClock::new());
        let cache = TtlCache::with_clock("standings", Duration::from_secs(900), clock.clone());
        let counter = AtomicU32::new(0);
        let fetch = |value: i32| {
            let counter = &counter;
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(value)
            }
        };

        assert_eq!(*cache.get_or_fetch(fetch(1)).await.unwrap(), 1);

        clock.advance(Duration::from_secs(899));
        assert_eq!(*cache.get_or_fetch(fetch(2)).await.unwrap(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(1));
        assert_eq!(*cache.get_or_fetch(fetch(3)).await.unwrap(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_entry() {
        let clock = Arc::new(ManualClock::new());
        let cache = TtlCache::with_clock("stats", Duration::from_secs(10), clock.clone());
        cache.put(7);
        clock.advance(Duration::from_secs(11));

        let err = cache
            .get_or_fetch(|| async { Err::<i32, _>("upstream down") })
            .await;
        assert!(err.is_err());

        // The stale entry is still there; only freshness hides it.
        assert!(cache.get().is_none());
        let slot = cache.slot.read().unwrap();
        assert_eq!(slot.as_ref().map(|e| *e.value), Some(7));
    }
}
