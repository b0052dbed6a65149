//! Millisecond Unix timestamps for payment authorization windows.
//!
//! The protocol stamps authorizations with a creation time and an expiry,
//! both in milliseconds since the Unix epoch, serialized as plain JSON
//! numbers. [`UnixMillis`] is the shared representation for both.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::ops::Add;
use std::time::SystemTime;

/// Milliseconds since the Unix epoch (1970-01-01T00:00:00Z).
///
/// Used for the `timestamp` and `expiry` fields of an authorization payload
/// and for nonce bookkeeping on the facilitator. Serialized as a JSON number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct UnixMillis(u64);

impl UnixMillis {
    /// Creates a timestamp from a raw milliseconds value.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the current system time.
    ///
    /// # Panics
    ///
    /// Panics if the system clock is set to a time before the Unix epoch,
    /// which should never happen on properly configured systems.
    #[must_use]
    pub fn now() -> Self {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("SystemTime before UNIX epoch?!?")
            .as_millis();
        Self(u64::try_from(now).expect("system time overflows u64 milliseconds"))
    }

    /// Returns the timestamp as raw milliseconds since the Unix epoch.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Whether this timestamp lies strictly before `other`.
    #[must_use]
    pub const fn is_before(&self, other: Self) -> bool {
        self.0 < other.0
    }
}

impl Display for UnixMillis {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add<u64> for UnixMillis {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0.saturating_add(rhs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_number() {
        let ts = UnixMillis::from_millis(1_700_000_000_123);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "1700000000123");
        let back: UnixMillis = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn ordering_and_add() {
        let t0 = UnixMillis::from_millis(1_000);
        let t1 = t0 + 500;
        assert!(t0.is_before(t1));
        assert!(!t1.is_before(t0));
        assert_eq!(t1.as_millis(), 1_500);
    }
}
