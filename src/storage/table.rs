//! SQLite Table
//!
//! Owns the connection and exposes the few primitives the cache store
//! needs. Every mutation runs inside [`SqliteTable::write`], which commits
//! when the closure succeeds and rolls back otherwise.

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use tracing::{info, warn};

use super::{DELETE_CHUNK, SCHEMA, TABLE_NAME};
use crate::cache::CacheEntry;
use crate::error::Result;

const SELECT_BY_KEY: &str = "SELECT key, value, saved_at, ttl FROM cache_entries WHERE key = ?1";
const INSERT_ROW: &str =
    "INSERT INTO cache_entries (key, value, saved_at, ttl) VALUES (?1, ?2, ?3, ?4)";
const DELETE_BY_KEY: &str = "DELETE FROM cache_entries WHERE key = ?1";
const COUNT_ROWS: &str = "SELECT COUNT(*) FROM cache_entries";

// == SQLite Table ==
/// Durable cache table backed by a SQLite connection.
#[derive(Debug)]
pub struct SqliteTable {
    conn: Connection,
}

impl SqliteTable {
    /// Opens (or creates) a database file and ensures the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let table = Self::from_connection(Connection::open(path)?)?;
        info!("Opened cache table at {}", path.display());
        Ok(table)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wraps an existing connection, creating the schema if needed.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Sets how long statements wait on a locked database before failing.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    // == Reads ==
    /// Point lookup by key. Staleness is not checked here.
    pub fn lookup(&self, key: &str) -> Result<Option<CacheEntry>> {
        let entry = self
            .conn
            .prepare_cached(SELECT_BY_KEY)?
            .query_row(params![key], |row| {
                Ok(CacheEntry {
                    key: row.get(0)?,
                    value: row.get(1)?,
                    saved_at: row.get(2)?,
                    ttl: row.get(3)?,
                })
            })
            .optional()?;
        Ok(entry)
    }

    /// Counts physical rows, stale ones included.
    pub fn row_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(COUNT_ROWS, [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    // == Writes ==
    /// Runs `f` inside an immediate transaction.
    ///
    /// Commits when `f` returns `Ok`. On `Err` the transaction is rolled
    /// back and the error is returned unchanged; a panic inside `f` rolls
    /// back when the transaction is dropped.
    pub fn write<R, F>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&TableWriter<'_>) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = f(&TableWriter { conn: &tx });

        match outcome {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "Rolling back cache transaction");
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

// == Table Writer ==
/// Mutation handle valid for the duration of one transaction.
#[derive(Debug)]
pub struct TableWriter<'c> {
    conn: &'c Connection,
}

impl TableWriter<'_> {
    /// Inserts a row. Fails if a row with the same key is still present.
    pub fn insert(&self, entry: &CacheEntry) -> Result<()> {
        self.conn.prepare_cached(INSERT_ROW)?.execute(params![
            entry.key,
            entry.value,
            entry.saved_at,
            entry.ttl
        ])?;
        Ok(())
    }

    /// Deletes the row for `key`, returning the number of rows removed.
    pub fn delete_key(&self, key: &str) -> Result<usize> {
        Ok(self.conn.prepare_cached(DELETE_BY_KEY)?.execute(params![key])?)
    }

    /// Deletes every row whose key is in `keys`.
    ///
    /// Keys are bound as parameters, never spliced into the SQL text.
    pub fn delete_keys<S: AsRef<str>>(&self, keys: &[S]) -> Result<usize> {
        let mut removed = 0;
        for chunk in keys.chunks(DELETE_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!("DELETE FROM {} WHERE key IN ({})", TABLE_NAME, placeholders);
            removed += self
                .conn
                .execute(&sql, params_from_iter(chunk.iter().map(|key| key.as_ref())))?;
        }
        Ok(removed)
    }

    /// Deletes all rows.
    pub fn clear(&self) -> Result<usize> {
        Ok(self
            .conn
            .execute(&format!("DELETE FROM {}", TABLE_NAME), [])?)
    }

    /// Deletes rows that are stale at `now` (Unix milliseconds).
    pub fn purge_expired(&self, now: i64) -> Result<usize> {
        Ok(self.conn.execute(
            &format!("DELETE FROM {} WHERE ?1 - saved_at >= ttl", TABLE_NAME),
            params![now],
        )?)
    }
}
