//! Cache Entry Module
//!
//! Defines the persisted row and how its freshness is computed.

use std::time::Duration;

use chrono::Utc;

use crate::config::duration_to_ms;

// == Cache Entry ==
/// One row of the cache table.
///
/// Freshness is derived, never stored: an entry is fresh while
/// `now - saved_at < ttl`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Lookup key, unique per table
    pub key: String,
    /// Encoded value text
    pub value: String,
    /// Write timestamp (Unix milliseconds)
    pub saved_at: i64,
    /// Validity window after `saved_at`, in milliseconds
    pub ttl: i64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry stamped with the given write time.
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        saved_at: i64,
        ttl: Duration,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            saved_at,
            ttl: i64::try_from(duration_to_ms(ttl)).unwrap_or(i64::MAX),
        }
    }

    // == Freshness ==
    /// Checks freshness against an explicit clock reading.
    ///
    /// Boundary condition: once exactly `ttl` milliseconds have elapsed the
    /// entry is stale. A clock that moved backwards keeps the entry fresh.
    pub fn is_fresh_at(&self, now: i64) -> bool {
        now.saturating_sub(self.saved_at) < self.ttl
    }

    /// Checks freshness against the current time.
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(current_timestamp_ms())
    }

    // == Time To Live ==
    /// Returns how long the entry stays fresh, or zero once stale.
    pub fn ttl_remaining_at(&self, now: i64) -> Duration {
        let elapsed = now.saturating_sub(self.saved_at).max(0);
        let remaining = self.ttl.saturating_sub(elapsed).max(0);
        Duration::from_millis(remaining as u64)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new("k", "v", 1_000, Duration::from_secs(60));

        assert_eq!(entry.key, "k");
        assert_eq!(entry.value, "v");
        assert_eq!(entry.saved_at, 1_000);
        assert_eq!(entry.ttl, 60_000);
    }

    #[test]
    fn test_freshness_boundary() {
        let entry = CacheEntry::new("k", "v", 1_000, Duration::from_millis(100));

        assert!(entry.is_fresh_at(1_000));
        assert!(entry.is_fresh_at(1_099));
        assert!(!entry.is_fresh_at(1_100), "Entry should be stale once ttl has elapsed");
        assert!(!entry.is_fresh_at(5_000));
    }

    #[test]
    fn test_clock_moving_backwards_stays_fresh() {
        let entry = CacheEntry::new("k", "v", 10_000, Duration::from_millis(100));
        assert!(entry.is_fresh_at(9_000));
    }

    #[test]
    fn test_zero_ttl_is_never_fresh() {
        let entry = CacheEntry::new("k", "v", 1_000, Duration::ZERO);
        assert!(!entry.is_fresh_at(1_000));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let entry = CacheEntry::new("k", "v", 0, Duration::MAX);
        assert_eq!(entry.ttl, i64::MAX);
        assert!(entry.is_fresh_at(i64::MAX - 1));
    }

    #[test]
    fn test_ttl_remaining() {
        let entry = CacheEntry::new("k", "v", 1_000, Duration::from_millis(500));

        assert_eq!(entry.ttl_remaining_at(1_200), Duration::from_millis(300));
        assert_eq!(entry.ttl_remaining_at(2_000), Duration::ZERO);
        assert_eq!(entry.ttl_remaining_at(0), Duration::from_millis(500));
    }

    #[test]
    fn test_entry_expiration_with_real_clock() {
        let entry = CacheEntry::new("k", "v", current_timestamp_ms(), Duration::from_millis(100));

        assert!(entry.is_fresh());

        sleep(Duration::from_millis(150));

        assert!(!entry.is_fresh());
    }
}
