//! Storage Module
//!
//! The durable table behind the cache: a single SQLite table with point
//! lookup, insert, delete and scoped transactions.

mod table;

pub use table::{SqliteTable, TableWriter};

/// Name of the table holding cache rows.
pub const TABLE_NAME: &str = "cache_entries";

/// Schema created on open. The primary key backs the one-row-per-key rule.
pub(crate) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS cache_entries (
    key      TEXT PRIMARY KEY NOT NULL,
    value    TEXT NOT NULL,
    saved_at INTEGER NOT NULL,
    ttl      INTEGER NOT NULL
);";

/// Keys bound per `DELETE ... IN (...)` statement, below SQLite's
/// host parameter limit.
pub(crate) const DELETE_CHUNK: usize = 500;
