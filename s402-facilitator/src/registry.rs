//! Durable store of single-use nonces.
//!
//! The [`NonceRegistry`] owns the replay-protection invariant: a nonce moves
//! `active → used` at most once, and a nonce past its expiry is never
//! accepted. It is the only shared mutable state in the facilitator; every
//! other value is request-scoped.
//!
//! The registry is an injected, lifecycle-scoped value — constructed at
//! startup, shared behind an [`std::sync::Arc`], and dropped on shutdown.
//! Internally it is a sharded concurrent map, so `mark_used` and the sweep
//! contend only on the shard holding the record they touch.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use s402::proto::{NonceRecord, NonceState, NonceStats};
use s402::timestamp::UnixMillis;

/// Record as held by the registry.
///
/// Carries the wire-visible [`NonceRecord`] plus the consumption time used to
/// age out settled records after the retention window.
#[derive(Debug, Clone)]
struct StoredRecord {
    record: NonceRecord,
    used_at: Option<UnixMillis>,
}

impl StoredRecord {
    /// State of the record as of `now`, accounting for expiry that the sweep
    /// has not yet materialized.
    fn state_at(&self, now: UnixMillis) -> NonceState {
        match self.record.state {
            NonceState::Used => NonceState::Used,
            NonceState::Active | NonceState::Expired => {
                if self.record.expires_at.is_before(now) {
                    NonceState::Expired
                } else {
                    NonceState::Active
                }
            }
        }
    }
}

/// Concurrency-safe registry of single-use nonces.
#[derive(Debug)]
pub struct NonceRegistry {
    records: DashMap<String, StoredRecord>,
    ttl_ms: u64,
    used_retention_ms: u64,
}

impl NonceRegistry {
    /// Creates a registry.
    ///
    /// `ttl_ms` bounds how long a freshly registered nonce stays eligible for
    /// settlement; `used_retention_ms` bounds how long a consumed record is
    /// kept for observability before the sweep removes it.
    #[must_use]
    pub fn new(ttl_ms: u64, used_retention_ms: u64) -> Self {
        Self {
            records: DashMap::new(),
            ttl_ms,
            used_retention_ms,
        }
    }

    /// Registers a nonce on first sight and reports its current state.
    ///
    /// An unseen nonce is stored as `active` with an expiry of now + TTL and
    /// `Active` is returned. A known nonce is never re-registered; the
    /// returned state reflects it as of now (`Used` for consumed nonces,
    /// `Expired` for nonces past their expiry, `Active` otherwise).
    pub fn register_if_absent(&self, nonce: &str, owner: &str, resource: &str) -> NonceState {
        let now = UnixMillis::now();
        match self.records.entry(nonce.to_owned()) {
            Entry::Occupied(occupied) => occupied.get().state_at(now),
            Entry::Vacant(vacant) => {
                vacant.insert(StoredRecord {
                    record: NonceRecord {
                        nonce: nonce.to_owned(),
                        owner: owner.to_owned(),
                        resource: resource.to_owned(),
                        issued_at: now,
                        expires_at: now + self.ttl_ms,
                        state: NonceState::Active,
                    },
                    used_at: None,
                });
                NonceState::Active
            }
        }
    }

    /// Atomically transitions a nonce `active → used`.
    ///
    /// Returns `false` if the nonce is absent, already used, or expired.
    /// Concurrent callers race on the record's shard lock, so exactly one
    /// observes `true`; the transition is never rolled back.
    pub fn mark_used(&self, nonce: &str) -> bool {
        let now = UnixMillis::now();
        match self.records.get_mut(nonce) {
            Some(mut stored) => {
                if stored.state_at(now) == NonceState::Active {
                    stored.record.state = NonceState::Used;
                    stored.used_at = Some(now);
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    /// Looks up a nonce, materializing expiry in the returned state.
    #[must_use]
    pub fn get(&self, nonce: &str) -> Option<NonceRecord> {
        let now = UnixMillis::now();
        self.records.get(nonce).map(|stored| {
            let mut record = stored.record.clone();
            record.state = stored.state_at(now);
            record
        })
    }

    /// Removes dead records and returns how many were dropped.
    ///
    /// A record is dead when it expired without ever being used, or when it
    /// was used and the retention window has passed since consumption.
    /// Removal takes the same per-shard locks as [`Self::mark_used`], so the
    /// sweep never races a concurrent consumption of the same record.
    pub fn sweep_expired(&self) -> u64 {
        let now = UnixMillis::now();
        let mut removed = 0u64;
        self.records.retain(|_, stored| {
            let dead = match stored.used_at {
                Some(used_at) => (used_at + self.used_retention_ms).is_before(now),
                None => stored.record.expires_at.is_before(now),
            };
            if dead {
                removed += 1;
            }
            !dead
        });
        removed
    }

    /// Aggregate counts by effective state.
    #[must_use]
    pub fn stats(&self) -> NonceStats {
        let now = UnixMillis::now();
        let mut stats = NonceStats::default();
        for entry in &self.records {
            stats.total_nonces += 1;
            match entry.value().state_at(now) {
                NonceState::Active => stats.active_nonces += 1,
                NonceState::Used => stats.used_nonces += 1,
                NonceState::Expired => stats.expired_nonces += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    const HOUR_MS: u64 = 60 * 60 * 1000;

    #[test]
    fn registers_unseen_nonce_as_active() {
        let registry = NonceRegistry::new(HOUR_MS, HOUR_MS);
        assert_eq!(
            registry.register_if_absent("n-1", "pk", "/api/procure"),
            NonceState::Active
        );
        let record = registry.get("n-1").unwrap();
        assert_eq!(record.state, NonceState::Active);
        assert_eq!(record.owner, "pk");
        assert!(record.issued_at.is_before(record.expires_at));
    }

    #[test]
    fn registration_is_idempotent_and_preserves_state() {
        let registry = NonceRegistry::new(HOUR_MS, HOUR_MS);
        registry.register_if_absent("n-1", "pk", "/r");
        assert!(registry.mark_used("n-1"));
        assert_eq!(
            registry.register_if_absent("n-1", "pk", "/r"),
            NonceState::Used
        );
    }

    #[test]
    fn mark_used_succeeds_at_most_once() {
        let registry = NonceRegistry::new(HOUR_MS, HOUR_MS);
        registry.register_if_absent("n-1", "pk", "/r");
        assert!(registry.mark_used("n-1"));
        assert!(!registry.mark_used("n-1"));
    }

    #[test]
    fn mark_used_rejects_absent_and_expired() {
        let registry = NonceRegistry::new(10, HOUR_MS);
        assert!(!registry.mark_used("never-registered"));

        registry.register_if_absent("n-1", "pk", "/r");
        std::thread::sleep(Duration::from_millis(30));
        assert!(!registry.mark_used("n-1"));
        assert_eq!(registry.get("n-1").unwrap().state, NonceState::Expired);
    }

    #[test]
    fn concurrent_mark_used_has_exactly_one_winner() {
        let registry = Arc::new(NonceRegistry::new(HOUR_MS, HOUR_MS));
        registry.register_if_absent("contested", "pk", "/r");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.mark_used("contested"))
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap_or(false))
            .filter(|&won| won)
            .count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn sweep_removes_expired_never_used_records() {
        let registry = NonceRegistry::new(10, HOUR_MS);
        registry.register_if_absent("short-lived", "pk", "/r");
        assert_eq!(registry.stats().active_nonces, 1);

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(registry.stats().expired_nonces, 1);
        assert_eq!(registry.stats().active_nonces, 0);

        assert_eq!(registry.sweep_expired(), 1);
        assert!(registry.get("short-lived").is_none());
        assert_eq!(registry.stats().total_nonces, 0);
    }

    #[test]
    fn sweep_retains_used_records_until_retention_passes() {
        let registry = NonceRegistry::new(10, 10);
        registry.register_if_absent("spent", "pk", "/r");
        assert!(registry.mark_used("spent"));

        // Used records outlive their expiry but not the retention window.
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(registry.sweep_expired(), 0);
        assert_eq!(registry.get("spent").unwrap().state, NonceState::Used);

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(registry.sweep_expired(), 1);
        assert!(registry.get("spent").is_none());
    }

    #[test]
    fn stats_counts_by_effective_state() {
        let registry = NonceRegistry::new(HOUR_MS, HOUR_MS);
        registry.register_if_absent("a", "pk", "/r");
        registry.register_if_absent("b", "pk", "/r");
        registry.register_if_absent("c", "pk", "/r");
        registry.mark_used("b");

        let stats = registry.stats();
        assert_eq!(stats.total_nonces, 3);
        assert_eq!(stats.active_nonces, 2);
        assert_eq!(stats.used_nonces, 1);
        assert_eq!(stats.expired_nonces, 0);
    }
}
