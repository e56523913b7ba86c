//! Cache Store Module
//!
//! Main cache engine: encodes values, stamps them with save time and TTL,
//! persists them transactionally and decides freshness at read time.
//!
//! Expiration is lazy. A stale row reads as absent but stays in the table
//! until it is overwritten, deleted, cleared or purged on request.

use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::editor::CacheEditor;
use super::entry::{current_timestamp_ms, CacheEntry};
use super::stats::{CacheStats, StatsRecorder};
use crate::codec;
use crate::config::{duration_to_ms, CacheConfig};
use crate::error::{CacheError, Result};
use crate::storage::SqliteTable;

// == Cache Store ==
/// Persistent key-value cache with per-entry TTL.
#[derive(Debug)]
pub struct CacheStore {
    /// Durable row storage
    table: SqliteTable,
    /// Settings owned by this store
    config: CacheConfig,
    /// In-memory read/write counters
    stats: StatsRecorder,
}

impl CacheStore {
    // == Constructors ==
    /// Opens a store backed by a database file.
    pub fn open(path: impl AsRef<Path>, config: CacheConfig) -> Result<Self> {
        Self::with_table(SqliteTable::open(path)?, config)
    }

    /// Opens a store backed by a private in-memory database.
    pub fn open_in_memory(config: CacheConfig) -> Result<Self> {
        Self::with_table(SqliteTable::open_in_memory()?, config)
    }

    /// Builds a store on an already opened table.
    pub fn with_table(table: SqliteTable, config: CacheConfig) -> Result<Self> {
        table.set_busy_timeout(config.busy_timeout())?;
        Ok(Self {
            table,
            config,
            stats: StatsRecorder::default(),
        })
    }

    // == Configuration ==
    /// Returns this store's configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// TTL applied to writes that do not name one.
    pub fn default_ttl(&self) -> Duration {
        self.config.default_ttl()
    }

    /// Changes the default TTL for subsequent writes.
    ///
    /// Rows already in the table keep the TTL they were written with.
    pub fn set_default_ttl(&mut self, ttl: Duration) {
        self.config.default_ttl_ms = duration_to_ms(ttl);
        debug!(
            default_ttl_ms = self.config.default_ttl_ms,
            "Default TTL updated"
        );
    }

    // == Put ==
    /// Stores a value under `key` with the default TTL.
    ///
    /// Any previous row for `key` is replaced in the same transaction.
    pub fn put<V: Serialize + ?Sized>(&mut self, key: &str, value: &V) -> Result<()> {
        self.put_entry(key, value, None)
    }

    /// Stores a value under `key` with an explicit TTL.
    pub fn put_with_ttl<V: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &V,
        ttl: Duration,
    ) -> Result<()> {
        self.put_entry(key, value, Some(ttl))
    }

    fn put_entry<V: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &V,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let text = encode_for(key, value)?;
        let ttl = ttl.unwrap_or_else(|| self.default_ttl());
        let entry = CacheEntry::new(key, text, current_timestamp_ms(), ttl);

        self.table.write(|writer| {
            writer.delete_key(key)?;
            writer.insert(&entry)
        })?;

        self.stats.record_writes(1);
        debug!(key, ttl_ms = entry.ttl, "Stored cache entry");
        Ok(())
    }

    // == Get ==
    /// Reads the value for `key` as `T`.
    ///
    /// Returns `Ok(None)` when the key is absent or its entry is stale.
    /// A stored value that cannot be read as `T` is a decode error.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(entry) = self.fresh_entry(key)? else {
            return Ok(None);
        };
        let value = codec::decode(&entry.value).map_err(|source| CacheError::Decode {
            key: key.to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    /// Returns true when `get::<T>(key)` would return a value.
    ///
    /// Storage and decode failures both answer `false`; use
    /// [`CacheStore::contains`] to check presence without decoding.
    pub fn exists<T: DeserializeOwned>(&self, key: &str) -> bool {
        match self.get::<T>(key) {
            Ok(value) => value.is_some(),
            Err(err) => {
                warn!(key, error = %err, "Treating unreadable entry as absent");
                false
            }
        }
    }

    /// Checks for a fresh row without decoding its value.
    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self
            .table
            .lookup(key)?
            .map_or(false, |entry| entry.is_fresh()))
    }

    /// Time left before the entry for `key` goes stale.
    pub fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>> {
        let now = current_timestamp_ms();
        Ok(self
            .table
            .lookup(key)?
            .filter(|entry| entry.is_fresh_at(now))
            .map(|entry| entry.ttl_remaining_at(now)))
    }

    fn fresh_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        match self.table.lookup(key)? {
            Some(entry) if entry.is_fresh() => {
                trace!(key, "Cache hit");
                self.stats.record_hit();
                Ok(Some(entry))
            }
            Some(_) => {
                trace!(key, "Cache entry is stale");
                self.stats.record_expired();
                Ok(None)
            }
            None => {
                trace!(key, "Cache miss");
                self.stats.record_miss();
                Ok(None)
            }
        }
    }

    // == Delete ==
    /// Removes the row for `key`. Returns whether a row was removed.
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        let removed = self.table.write(|writer| writer.delete_key(key))?;
        debug!(key, removed, "Deleted cache entry");
        Ok(removed > 0)
    }

    /// Removes every row whose key is in `keys`, in one transaction.
    ///
    /// Returns the number of rows removed.
    pub fn delete_many<I, K>(&mut self, keys: I) -> Result<usize>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let keys: Vec<K> = keys.into_iter().collect();
        if keys.is_empty() {
            return Ok(0);
        }

        let removed = self.table.write(|writer| writer.delete_keys(&keys))?;
        debug!(requested = keys.len(), removed, "Deleted cache entries");
        Ok(removed)
    }

    /// Removes all rows.
    pub fn clear(&mut self) -> Result<usize> {
        let removed = self.table.write(|writer| writer.clear())?;
        debug!(removed, "Cleared cache");
        Ok(removed)
    }

    /// Physically removes stale rows. Only runs when called.
    pub fn purge_expired(&mut self) -> Result<usize> {
        let now = current_timestamp_ms();
        let removed = self.table.write(|writer| writer.purge_expired(now))?;
        if removed > 0 {
            info!("Purged {} stale cache entries", removed);
        }
        Ok(removed)
    }

    // == Batch ==
    /// Starts a batch of puts and removals applied in one transaction.
    pub fn editor(&mut self) -> CacheEditor<'_> {
        CacheEditor::new(self)
    }

    /// Deletes `doomed` and inserts `rows` atomically.
    pub(crate) fn commit_batch(&mut self, doomed: &[&str], rows: &[CacheEntry]) -> Result<()> {
        self.table.write(|writer| {
            writer.delete_keys(doomed)?;
            for row in rows {
                writer.insert(row)?;
            }
            Ok(())
        })?;

        self.stats.record_writes(rows.len());
        debug!(
            deleted = doomed.len(),
            inserted = rows.len(),
            "Applied cache batch"
        );
        Ok(())
    }

    // == Introspection ==
    /// Number of physical rows, stale ones included.
    pub fn len(&self) -> Result<usize> {
        self.table.row_count()
    }

    /// Returns true if the table holds no rows.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    #[cfg(test)]
    pub(crate) fn table(&self) -> &SqliteTable {
        &self.table
    }
}

/// Encodes `value`, attaching `key` to any failure.
pub(crate) fn encode_for<V: Serialize + ?Sized>(key: &str, value: &V) -> Result<String> {
    codec::encode(value).map_err(|source| CacheError::Encode {
        key: key.to_string(),
        source,
    })
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::HashMap;
    use std::thread::sleep;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        tags: Vec<String>,
    }

    fn store() -> CacheStore {
        CacheStore::open_in_memory(CacheConfig::default()).unwrap()
    }

    #[test]
    fn test_store_put_and_get() {
        let mut store = store();

        store.put("int", &42i64).unwrap();
        store.put("text", "hello").unwrap();
        store.put("flag", &true).unwrap();

        assert_eq!(store.get::<i64>("int").unwrap(), Some(42));
        assert_eq!(
            store.get::<String>("text").unwrap(),
            Some("hello".to_string())
        );
        assert_eq!(store.get::<bool>("flag").unwrap(), Some(true));
    }

    #[test]
    fn test_store_structured_value() {
        let mut store = store();
        let profile = Profile {
            name: "ada".to_string(),
            tags: vec!["a".to_string(), "b".to_string()],
        };

        store.put("profile", &profile).unwrap();

        assert_eq!(store.get::<Profile>("profile").unwrap(), Some(profile));
    }

    #[test]
    fn test_store_get_nonexistent() {
        let store = store();
        assert_eq!(store.get::<i64>("nonexistent").unwrap(), None);
    }

    #[test]
    fn test_store_overwrite_keeps_single_row() {
        let mut store = store();

        store.put("key1", "value1").unwrap();
        store.put("key1", "value2").unwrap();

        assert_eq!(
            store.get::<String>("key1").unwrap(),
            Some("value2".to_string())
        );
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_store_ttl_expiration() {
        let mut store = store();

        store
            .put_with_ttl("key1", "value1", Duration::from_millis(100))
            .unwrap();
        assert!(store.get::<String>("key1").unwrap().is_some());

        sleep(Duration::from_millis(150));

        assert_eq!(store.get::<String>("key1").unwrap(), None);
        // Lazy expiration: the row is still there.
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_default_ttl_applies_to_later_writes_only() {
        let mut store = store();

        store.put("early", &1).unwrap();
        store.set_default_ttl(Duration::from_millis(50));
        store.put("late", &2).unwrap();

        sleep(Duration::from_millis(100));

        assert_eq!(store.get::<i32>("early").unwrap(), Some(1));
        assert_eq!(store.get::<i32>("late").unwrap(), None);
    }

    #[test]
    fn test_stores_do_not_share_default_ttl() {
        let mut first = store();
        let second = store();

        first.set_default_ttl(Duration::from_secs(1));

        assert_eq!(first.default_ttl(), Duration::from_secs(1));
        assert_eq!(second.default_ttl(), CacheConfig::default().default_ttl());
    }

    #[test]
    fn test_decode_mismatch_is_an_error() {
        let mut store = store();
        store.put("obj", &json!({"x": 1})).unwrap();

        let result = store.get::<i64>("obj");
        assert!(matches!(result, Err(CacheError::Decode { ref key, .. }) if key == "obj"));
    }

    #[test]
    fn test_whole_float_reads_back_as_float() {
        let mut store = store();
        store.put("ratio", &json!(1.0)).unwrap();
        store.put("count", &json!(1)).unwrap();

        let ratio = store.get::<serde_json::Value>("ratio").unwrap().unwrap();
        assert!(ratio.is_f64());
        assert_eq!(ratio, json!(1.0));
        assert_eq!(store.get::<f64>("ratio").unwrap(), Some(1.0));
        assert_eq!(
            store.get::<serde_json::Value>("count").unwrap(),
            Some(json!(1))
        );
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(untagged)]
    enum Setting {
        Flag(char),
        Level(i64),
    }

    #[test]
    fn test_untagged_char_variant_roundtrip() {
        let mut store = store();
        store.put("mode", &Setting::Flag('z')).unwrap();
        store.put("depth", &Setting::Level(3)).unwrap();

        assert_eq!(store.get("mode").unwrap(), Some(Setting::Flag('z')));
        assert_eq!(store.get("depth").unwrap(), Some(Setting::Level(3)));
        assert_eq!(
            store.get::<serde_json::Value>("mode").unwrap(),
            Some(json!("z"))
        );
    }

    #[test]
    fn test_exists() {
        let mut store = store();
        store.put("fresh", &1).unwrap();
        store
            .put_with_ttl("stale", &1, Duration::from_millis(20))
            .unwrap();
        store.put("obj", &json!({"x": 1})).unwrap();

        sleep(Duration::from_millis(50));

        assert!(!store.exists::<i32>("absent"));
        assert!(store.exists::<i32>("fresh"));
        assert!(!store.exists::<i32>("stale"));
        assert!(
            !store.exists::<i32>("obj"),
            "Decode failure reads as absent"
        );
        assert!(store.contains("obj").unwrap());
        assert!(!store.contains("stale").unwrap());
    }

    #[test]
    fn test_store_delete() {
        let mut store = store();

        store.put("key1", "value1").unwrap();

        assert!(store.delete("key1").unwrap());
        assert!(!store.delete("key1").unwrap());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_delete_many_leaves_others() {
        let mut store = store();
        for key in ["a", "b", "c", "it's, tricky"] {
            store.put(key, &1).unwrap();
        }

        let removed = store.delete_many(["a", "it's, tricky", "missing"]).unwrap();

        assert_eq!(removed, 2);
        assert_eq!(store.get::<i32>("b").unwrap(), Some(1));
        assert_eq!(store.get::<i32>("c").unwrap(), Some(1));
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(store.delete_many(Vec::<String>::new()).unwrap(), 0);
    }

    #[test]
    fn test_clear() {
        let mut store = store();
        store.put("a", &1).unwrap();
        store.put("b", &2).unwrap();

        assert_eq!(store.clear().unwrap(), 2);
        assert_eq!(store.get::<i32>("a").unwrap(), None);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_encode_failure_writes_nothing() {
        let mut store = store();
        store.put("map", "previous").unwrap();

        let mut bad = HashMap::new();
        bad.insert((1, 2), 3);
        let result = store.put("map", &bad);

        assert!(matches!(result, Err(CacheError::Encode { .. })));
        assert_eq!(
            store.get::<String>("map").unwrap(),
            Some("previous".to_string())
        );
    }

    #[test]
    fn test_failed_put_keeps_previous_row() {
        let mut store = store();
        store.put("guarded", "old").unwrap();
        store
            .table
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_guarded BEFORE INSERT ON cache_entries
                 WHEN NEW.key = 'guarded'
                 BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
            )
            .unwrap();

        let result = store.put("guarded", "new");

        assert!(result.unwrap_err().is_storage());
        assert_eq!(
            store.get::<String>("guarded").unwrap(),
            Some("old".to_string())
        );
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_ttl_remaining() {
        let mut store = store();
        store
            .put_with_ttl("k", &1, Duration::from_secs(10))
            .unwrap();

        let remaining = store.ttl_remaining("k").unwrap().unwrap();
        assert!(remaining <= Duration::from_secs(10));
        assert!(remaining >= Duration::from_secs(9));
        assert_eq!(store.ttl_remaining("absent").unwrap(), None);
    }

    #[test]
    fn test_purge_expired() {
        let mut store = store();
        store
            .put_with_ttl("short", &1, Duration::from_millis(20))
            .unwrap();
        store.put("long", &2).unwrap();

        sleep(Duration::from_millis(50));

        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get::<i32>("long").unwrap(), Some(2));
    }

    #[test]
    fn test_store_stats() {
        let mut store = store();
        store.put("key1", "value1").unwrap();
        store.put_with_ttl("gone", &1, Duration::ZERO).unwrap();

        store.get::<String>("key1").unwrap(); // hit
        store.get::<String>("nonexistent").unwrap(); // miss
        store.get::<i32>("gone").unwrap(); // stale

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.writes, 2);
    }
}
