//! Time-bucketed, request-coalescing result cache.
//!
//! Built for lookups that many independent callers make for the same key
//! in a short window, such as "is product 42 in my wishlist?" asked by every
//! product card on a page. A [`Memo`]:
//!
//! - returns a completed result younger than its TTL without refetching,
//! - lets concurrent callers for one key share a single in-flight fetch,
//! - never caches errors (the next call retries),
//! - supports explicit [`invalidate`](Memo::invalidate) after mutations,
//! - drops expired entries whenever it inserts a new one.
//!
//! The cache is an ordinary value you construct and pass around, not a
//! process global, and its clock is injected so tests control time.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

/// Source of "now" for TTL decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Clock> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// A finished fetch and when it finished.
struct Stamped<V, E> {
    at: Instant,
    result: Result<V, E>,
}

type Cell<V, E> = Arc<OnceLock<Stamped<V, E>>>;

pub struct Memo<K, V, E, C = SystemClock> {
    ttl: Duration,
    clock: C,
    entries: Mutex<HashMap<K, Cell<V, E>>>,
}

impl<K, V, E> Memo<K, V, E, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
    E: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<K, V, E, C> Memo<K, V, E, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    E: Clone,
    C: Clock,
{
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Cell<V, E>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// In-flight entries are always reusable; finished ones only while
    /// successful and younger than the TTL.
    fn reusable(&self, cell: &Cell<V, E>, now: Instant) -> bool {
        match cell.get() {
            None => true,
            Some(done) => done.result.is_ok() && now.saturating_duration_since(done.at) < self.ttl,
        }
    }

    /// Return the cached value for `key`, or run `fetch` to produce it.
    ///
    /// Callers that arrive while another caller's fetch for the same key is
    /// running block until it finishes and share its result.
    pub fn get_or_fetch<F>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let cell = {
            let mut entries = self.lock();
            let now = self.clock.now();
            match entries.get(&key) {
                Some(cell) if self.reusable(cell, now) => Arc::clone(cell),
                _ => {
                    // Sweep on every miss so keys never asked for again do not pile up.
                    entries.retain(|_, c| self.reusable(c, now));
                    let cell: Cell<V, E> = Arc::new(OnceLock::new());
                    entries.insert(key.clone(), Arc::clone(&cell));
                    cell
                }
            }
        };

        let done = cell.get_or_init(|| {
            let result = fetch();
            Stamped {
                at: self.clock.now(),
                result,
            }
        });
        let result = done.result.clone();

        if result.is_err() {
            let mut entries = self.lock();
            if entries.get(&key).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
                entries.remove(&key);
            }
        }
        result
    }

    /// Fresh cached value for `key`, without fetching.
    pub fn peek(&self, key: &K) -> Option<V> {
        let entries = self.lock();
        let cell = entries.get(key)?;
        let done = cell.get()?;
        if !self.reusable(cell, self.clock.now()) {
            return None;
        }
        done.result.as_ref().ok().cloned()
    }

    /// Forget `key`. A fetch already running still completes for its
    /// waiters, but later calls fetch again.
    pub fn invalidate(&self, key: &K) {
        self.lock().remove(key);
    }

    /// Drop every finished entry older than the TTL. Returns how many went.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.lock();
        let now = self.clock.now();
        let before = entries.len();
        entries.retain(|_, c| self.reusable(c, now));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Wishlist membership checks keyed by product id.
///
/// Adding or removing a product invalidates its entry so the next check
/// asks the backend again.
pub struct WishlistCache<E, C = SystemClock> {
    memo: Memo<u64, bool, E, C>,
}

impl<E: Clone> WishlistCache<E, SystemClock> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            memo: Memo::new(ttl),
        }
    }
}

impl<E: Clone, C: Clock> WishlistCache<E, C> {
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            memo: Memo::with_clock(ttl, clock),
        }
    }

    pub fn is_wishlisted<F>(&self, product_id: u64, lookup: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<bool, E>,
    {
        let result = self.memo.get_or_fetch(product_id, lookup);
        if result.is_err() {
            tracing::debug!(product_id, "wishlist check failed; not cached");
        }
        result
    }

    pub fn added(&self, product_id: u64) {
        self.memo.invalidate(&product_id);
    }

    pub fn removed(&self, product_id: u64) {
        self.memo.invalidate(&product_id);
    }
}
