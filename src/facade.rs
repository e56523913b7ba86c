//! Typed Facade
//!
//! Convenience layer over [`CacheStore`]: typed getters with defaults and
//! TTLs given as an amount plus a [`TimeUnit`].

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{CacheEditor, CacheStore};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::time_unit::TimeUnit;

/// Persistent TTL cache with typed accessors.
///
/// # Example
/// ```no_run
/// use timecache::{CacheConfig, TimeCache, TimeUnit};
///
/// let mut cache = TimeCache::open("cache.db", CacheConfig::default())?;
/// cache.set_cache_time(30, TimeUnit::Minutes);
/// cache.put("greeting", "hello")?;
/// assert_eq!(cache.get_string("greeting")?, "hello");
/// # Ok::<(), timecache::CacheError>(())
/// ```
#[derive(Debug)]
pub struct TimeCache {
    store: CacheStore,
}

impl TimeCache {
    /// Opens a cache backed by a database file.
    pub fn open(path: impl AsRef<Path>, config: CacheConfig) -> Result<Self> {
        Ok(Self::from_store(CacheStore::open(path, config)?))
    }

    /// Opens a cache backed by a private in-memory database.
    pub fn open_in_memory(config: CacheConfig) -> Result<Self> {
        Ok(Self::from_store(CacheStore::open_in_memory(config)?))
    }

    /// Wraps an existing store.
    pub fn from_store(store: CacheStore) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Mutable access to the underlying store.
    pub fn store_mut(&mut self) -> &mut CacheStore {
        &mut self.store
    }

    // == Writes ==
    /// Stores a value with the default TTL.
    pub fn put<V: Serialize + ?Sized>(&mut self, key: &str, value: &V) -> Result<()> {
        self.store.put(key, value)
    }

    /// Stores a value that stays fresh for `amount` of `unit`.
    pub fn put_for<V: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &V,
        amount: u64,
        unit: TimeUnit,
    ) -> Result<()> {
        self.store.put_with_ttl(key, value, unit.duration(amount))
    }

    /// Removes one key.
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        self.store.delete(key)
    }

    /// Removes a set of keys in one transaction.
    pub fn remove_many<I, K>(&mut self, keys: I) -> Result<usize>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        self.store.delete_many(keys)
    }

    /// Removes everything.
    pub fn clear(&mut self) -> Result<usize> {
        self.store.clear()
    }

    /// Starts a batch.
    pub fn editor(&mut self) -> CacheEditor<'_> {
        self.store.editor()
    }

    // == TTL ==
    /// Sets the default TTL used by later writes.
    pub fn set_cache_time(&mut self, amount: u64, unit: TimeUnit) {
        self.store.set_default_ttl(unit.duration(amount));
    }

    /// Sets the default TTL in days.
    pub fn set_cache_days(&mut self, days: u64) {
        self.set_cache_time(days, TimeUnit::Days);
    }

    // == Reads ==
    /// Reads a value; `None` when absent or stale.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.store.get(key)
    }

    /// Reads a value, falling back to `default` when absent or stale.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.store.get(key)?.unwrap_or(default))
    }

    /// Reads a string, or `""`.
    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get_string_or(key, "")
    }

    /// Reads a string. An empty stored string also yields `default`.
    pub fn get_string_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .store
            .get::<String>(key)?
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| default.to_string()))
    }

    /// Reads an integer, or 0.
    pub fn get_int(&self, key: &str) -> Result<i64> {
        self.get_or(key, 0)
    }

    /// Reads a single-precision float, or 0.0.
    pub fn get_f32(&self, key: &str) -> Result<f32> {
        self.get_or(key, 0.0)
    }

    /// Reads a double-precision float, or 0.0.
    pub fn get_f64(&self, key: &str) -> Result<f64> {
        self.get_or(key, 0.0)
    }

    /// See [`CacheStore::exists`].
    pub fn exists<T: DeserializeOwned>(&self, key: &str) -> bool {
        self.store.exists::<T>(key)
    }
}
