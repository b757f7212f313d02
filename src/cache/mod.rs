//! Process-local caching of player read aggregations.
//!
//! [`PlayerCache`] is the store. [`PlayerCacheKey`] and [`CachePolicy`]
//! decide what a player report is cached under and for how long:
//! range-filtered reports go stale sooner than all-time reports, so they
//! get the shorter TTL.

pub mod player_cache;

use std::time::{Duration, Instant};

use moka::Expiry;

use crate::domain::DateRange;

pub use player_cache::PlayerCache;

/// Composite key of one player report query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlayerCacheKey {
    /// Canonical room code.
    pub room: String,
    /// Player identity.
    pub player_name: String,
    /// Date filter; `None` for an all-time query.
    pub range: Option<DateRange>,
}

impl PlayerCacheKey {
    /// Builds a key for the given query.
    #[must_use]
    pub fn new(room: &str, player_name: &str, range: Option<DateRange>) -> Self {
        Self {
            room: room.to_string(),
            player_name: player_name.to_string(),
            range,
        }
    }
}

/// TTL selection by query shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// TTL of range-filtered queries.
    pub ranged_ttl: Duration,
    /// TTL of all-time queries.
    pub unranged_ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ranged_ttl: Duration::from_secs(300),
            unranged_ttl: Duration::from_secs(1800),
        }
    }
}

impl CachePolicy {
    /// TTL for `key`.
    #[must_use]
    pub fn ttl_for(&self, key: &PlayerCacheKey) -> Duration {
        if key.range.is_some() {
            self.ranged_ttl
        } else {
            self.unranged_ttl
        }
    }
}

/// Entries are keyed by `(generation, query)`; the TTL only depends on the
/// query. A rewrite restarts the clock.
impl<V> Expiry<(u64, PlayerCacheKey), V> for CachePolicy {
    fn expire_after_create(
        &self,
        key: &(u64, PlayerCacheKey),
        _value: &V,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.ttl_for(&key.1))
    }

    fn expire_after_update(
        &self,
        key: &(u64, PlayerCacheKey),
        _value: &V,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.ttl_for(&key.1))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    pub(crate) fn january() -> DateRange {
        let (Some(from), Some(to)) = (
            NaiveDate::from_ymd_opt(2024, 1, 1),
            NaiveDate::from_ymd_opt(2024, 1, 31),
        ) else {
            panic!("valid dates");
        };
        let Ok(range) = DateRange::new(from, to) else {
            panic!("valid range");
        };
        range
    }

    #[test]
    fn ranged_queries_get_the_shorter_ttl() {
        let policy = CachePolicy::default();
        let ranged = PlayerCacheKey::new("XPK", "hero", Some(january()));
        let unranged = PlayerCacheKey::new("XPK", "hero", None);
        assert_eq!(policy.ttl_for(&ranged), Duration::from_secs(300));
        assert_eq!(policy.ttl_for(&unranged), Duration::from_secs(1800));
        assert_ne!(ranged, unranged);
    }

    #[test]
    fn expiry_follows_the_query_shape() {
        let policy = CachePolicy::default();
        let ranged = (3, PlayerCacheKey::new("XPK", "hero", Some(january())));
        let ttl = Expiry::<_, ()>::expire_after_create(&policy, &ranged, &(), Instant::now());
        assert_eq!(ttl, Some(Duration::from_secs(300)));
        let ttl = Expiry::<_, ()>::expire_after_update(
            &policy,
            &ranged,
            &(),
            Instant::now(),
            Some(Duration::from_secs(1)),
        );
        assert_eq!(ttl, Some(Duration::from_secs(300)));
    }
}
