//! Cache Module
//!
//! Persistent key-value caching with lazy TTL expiration and batched writes.

mod editor;
mod entry;
mod stats;
mod store;


// Re-export public types
pub use editor::CacheEditor;
pub use entry::{current_timestamp_ms, CacheEntry};
pub use stats::CacheStats;
pub use store::CacheStore;
