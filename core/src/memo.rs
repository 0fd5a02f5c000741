use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::debug;
use once_cell::sync::OnceCell;

use crate::outcome::Outcome;

type Compute<K, V, E> = Box<dyn Fn(&K) -> Result<V, E> + Send + Sync>;

/// Thread-safe memoizing wrapper around a function of one argument.
///
/// Each key is computed at most once, successful results are cached and
/// failures are returned without being remembered, so a later call retries.
/// Keys are computed independently: lookups of other keys do not wait for a
/// slow computation. `compute` may call back into the memo for a different
/// key, asking for the key being computed deadlocks.
///
/// ```rust
/// use tryout_core::memo::Memo;
///
/// let square = Memo::new(|n: &u64| n * n);
/// assert_eq!(square.get(12).or_else(0), 144);
/// assert_eq!(square.len(), 1);
/// ```
pub struct Memo<K, V, E = anyhow::Error> {
    compute: Compute<K, V, E>,
    cache: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Memo<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + 'static,
{
    /// Memoizes an infallible function.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn(&K) -> V + Send + Sync + 'static,
    {
        Self::fallible(move |key| Ok(compute(key)))
    }
}

impl<K, V, E> Memo<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Memoizes a fallible function. Errors are never cached.
    pub fn fallible<F>(compute: F) -> Self
    where
        F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
    {
        Self {
            compute: Box::new(compute),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Arc<OnceCell<V>>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns cached value for `key`, computing it on first use.
    /// Concurrent callers of the same key wait for a single computation.
    pub fn get(&self, key: K) -> Outcome<V, E> {
        let cell = self.lock().entry(key.clone()).or_default().clone();

        Outcome::attempt_value(|| cell.get_or_try_init(|| (self.compute)(&key)).cloned())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lock()
            .get(key)
            .map_or(false, |cell| cell.get().is_some())
    }

    /// Drops cached value of `key`, returns it if it was present.
    pub fn forget(&self, key: &K) -> Option<V> {
        self.lock()
            .remove(key)
            .and_then(|cell| cell.get().cloned())
    }

    pub fn clear(&self) {
        let mut cache = self.lock();
        debug!("clearing memo with {} entries", cache.len());
        cache.clear();
    }

    /// Number of cached values. Keys still being computed are not counted.
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lazily computed value, cached after the first success.
pub struct Cached<T, E = anyhow::Error> {
    cell: OnceCell<T>,
    supplier: Box<dyn Fn() -> Result<T, E> + Send + Sync>,
}

impl<T, E> Cached<T, E> {
    pub fn new<F>(supplier: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            supplier: Box::new(supplier),
        }
    }

    /// Returns the value, running the supplier if nothing is cached yet.
    /// A failed attempt leaves the cache empty.
    pub fn get(&self) -> Outcome<&T, E> {
        Outcome::attempt_value(|| self.cell.get_or_try_init(|| (self.supplier)()))
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}
