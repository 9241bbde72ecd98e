//! TTL cache layer for sessions and profiles
//!
//! The cache holds copies of derived data; losing an entry never invalidates
//! the live session. Expiry is checked against monotonic time on every read,
//! and all time is passed in explicitly so tests control the clock.

use fleetdesk_api::{Profile, Session};
use fleetdesk_util::MonotonicInstant;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Key under which the current session is cached
pub const SESSION_CACHE_KEY: &str = "current";

/// A cached value with its storage instant and time-to-live.
///
/// Valid iff `now <= stored_at + ttl`.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub stored_at: MonotonicInstant,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    fn is_valid(&self, now: MonotonicInstant) -> bool {
        now <= self.stored_at + self.ttl
    }
}

/// Generic TTL map. Hit/miss accounting lives in [`AuthCache`] so the two
/// kinds share one counter pair.
#[derive(Debug)]
struct TtlMap<T> {
    entries: HashMap<String, CacheEntry<T>>,
    default_ttl: Duration,
}

impl<T: Clone> TtlMap<T> {
    fn new(default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            default_ttl,
        }
    }

    /// Returns the value iff not expired; expired entries are evicted as a
    /// side effect.
    fn get(&mut self, key: &str, now: MonotonicInstant) -> Option<T> {
        match self.entries.get(key) {
            Some(entry) if entry.is_valid(now) => Some(entry.data.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&mut self, key: impl Into<String>, data: T, ttl: Duration, now: MonotonicInstant) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                data,
                stored_at: now,
                ttl,
            },
        );
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    /// Evict every expired entry, returning how many were removed
    fn prune(&mut self, now: MonotonicInstant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_valid(now));
        before - self.entries.len()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The cache layer: one map per data kind, shared hit/miss counters.
#[derive(Debug)]
pub struct AuthCache {
    sessions: TtlMap<Session>,
    profiles: TtlMap<Profile>,
    hits: u64,
    misses: u64,
}

impl AuthCache {
    pub fn new(session_ttl: Duration, profile_ttl: Duration) -> Self {
        Self {
            sessions: TtlMap::new(session_ttl),
            profiles: TtlMap::new(profile_ttl),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a cached session. Every call increments exactly one of the
    /// hit/miss counters; an expired entry is evicted and counts as a miss.
    pub fn get_session(&mut self, key: &str, now: MonotonicInstant) -> Option<Session> {
        let result = self.sessions.get(key, now);
        self.count(result.is_some());
        result
    }

    /// Cache a session under the kind-default TTL
    pub fn put_session(&mut self, key: impl Into<String>, session: Session, now: MonotonicInstant) {
        let ttl = self.sessions.default_ttl;
        self.sessions.set(key, session, ttl, now);
    }

    /// Cache a session under an explicit TTL
    pub fn put_session_with_ttl(
        &mut self,
        key: impl Into<String>,
        session: Session,
        ttl: Duration,
        now: MonotonicInstant,
    ) {
        self.sessions.set(key, session, ttl, now);
    }

    /// Drop a cached session without touching the counters (sign-in rollback)
    pub fn remove_session(&mut self, key: &str) {
        self.sessions.remove(key);
    }

    /// Look up a cached profile by user id
    pub fn get_profile(&mut self, user_key: &str, now: MonotonicInstant) -> Option<Profile> {
        let result = self.profiles.get(user_key, now);
        self.count(result.is_some());
        result
    }

    /// Cache a profile under the kind-default TTL
    pub fn put_profile(&mut self, user_key: impl Into<String>, profile: Profile, now: MonotonicInstant) {
        let ttl = self.profiles.default_ttl;
        self.profiles.set(user_key, profile, ttl, now);
    }

    /// Empty both maps and zero both counters. Used on sign-out so no
    /// identity data leaks into a later session.
    pub fn clear(&mut self) {
        self.sessions.clear();
        self.profiles.clear();
        self.hits = 0;
        self.misses = 0;
    }

    /// Evict all expired entries; runs on a fixed interval independent of
    /// reads so memory cannot grow without active lookups.
    pub fn prune(&mut self, now: MonotonicInstant) -> usize {
        let evicted = self.sessions.prune(now) + self.profiles.prune(now);
        if evicted > 0 {
            debug!(evicted, "Pruned expired cache entries");
        }
        evicted
    }

    /// `hits / (hits + misses) * 100`, 0 when no lookups yet
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }

    pub fn counters(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    /// Restore persisted counters on boot so hit-rate history survives
    pub fn restore_counters(&mut self, hits: u64, misses: u64) {
        self.hits = hits;
        self.misses = misses;
    }

    pub fn lookup_count(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn entry_count(&self) -> usize {
        self.sessions.len() + self.profiles.len()
    }

    fn count(&mut self, hit: bool) {
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }
}
