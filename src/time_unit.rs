//! TTL units accepted by the facade, normalized to milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Unit for a TTL amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
}

impl TimeUnit {
    /// Milliseconds in one unit.
    pub fn millis_per_unit(self) -> u64 {
        match self {
            TimeUnit::Days => 24 * 60 * 60 * 1000,
            TimeUnit::Hours => 60 * 60 * 1000,
            TimeUnit::Minutes => 60 * 1000,
            TimeUnit::Seconds => 1000,
            TimeUnit::Milliseconds => 1,
        }
    }

    /// Converts `amount` of this unit to a duration, saturating on overflow.
    pub fn duration(self, amount: u64) -> Duration {
        Duration::from_millis(amount.saturating_mul(self.millis_per_unit()))
    }
}
