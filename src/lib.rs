//! Timecache - A persistent key-value cache with TTL expiration
//!
//! Values are stored in a SQLite table together with their save time and
//! TTL. Expiration is decided when a value is read; stale rows are never
//! swept in the background.

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod facade;
pub mod storage;
pub mod time_unit;

pub use cache::{CacheEditor, CacheEntry, CacheStats, CacheStore};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use facade::TimeCache;
pub use time_unit::TimeUnit;
