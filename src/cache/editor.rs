//! Batch Editor Module
//!
//! Stages puts and removals, then applies them in a single transaction.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use super::entry::{current_timestamp_ms, CacheEntry};
use super::store::{encode_for, CacheStore};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Staged {
    Put {
        value: String,
        ttl: Option<Duration>,
    },
    Remove,
}

// == Cache Editor ==
/// Accumulates mutations against a [`CacheStore`].
///
/// Nothing touches storage until [`CacheEditor::apply`]. A key keeps only
/// its most recently staged operation. After a successful apply the editor
/// is empty and can stage a new batch; after a failed apply the staged
/// operations are kept so the caller can retry or [`discard`](Self::discard).
#[derive(Debug)]
pub struct CacheEditor<'a> {
    store: &'a mut CacheStore,
    staged: BTreeMap<String, Staged>,
}

impl<'a> CacheEditor<'a> {
    pub(crate) fn new(store: &'a mut CacheStore) -> Self {
        Self {
            store,
            staged: BTreeMap::new(),
        }
    }

    /// Stages a write with the store's default TTL.
    ///
    /// The value is encoded now, so an unsupported value fails here
    /// rather than at apply time.
    pub fn put<V: Serialize + ?Sized>(&mut self, key: &str, value: &V) -> Result<&mut Self> {
        self.stage_put(key, value, None)
    }

    /// Stages a write with an explicit TTL.
    pub fn put_with_ttl<V: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &V,
        ttl: Duration,
    ) -> Result<&mut Self> {
        self.stage_put(key, value, Some(ttl))
    }

    fn stage_put<V: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &V,
        ttl: Option<Duration>,
    ) -> Result<&mut Self> {
        let value = encode_for(key, value)?;
        self.staged.insert(key.to_string(), Staged::Put { value, ttl });
        Ok(self)
    }

    /// Stages a removal.
    pub fn remove(&mut self, key: &str) -> &mut Self {
        self.staged.insert(key.to_string(), Staged::Remove);
        self
    }

    /// Number of keys with a staged operation.
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    /// Returns true if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Drops every staged operation without applying it.
    pub fn discard(&mut self) {
        self.staged.clear();
    }

    /// Applies the staged operations in one transaction.
    ///
    /// All staged keys are deleted first, then the staged writes are
    /// inserted with one shared save time. Any failure rolls the whole
    /// batch back. Returns the number of keys applied.
    pub fn apply(&mut self) -> Result<usize> {
        if self.staged.is_empty() {
            return Ok(0);
        }

        let now = current_timestamp_ms();
        let default_ttl = self.store.default_ttl();
        let doomed: Vec<&str> = self.staged.keys().map(String::as_str).collect();
        let rows: Vec<CacheEntry> = self
            .staged
            .iter()
            .filter_map(|(key, op)| match op {
                Staged::Put { value, ttl } => Some(CacheEntry::new(
                    key.as_str(),
                    value.as_str(),
                    now,
                    ttl.unwrap_or(default_ttl),
                )),
                Staged::Remove => None,
            })
            .collect();

        self.store.commit_batch(&doomed, &rows)?;

        let applied = self.staged.len();
        self.staged.clear();
        Ok(applied)
    }
}
