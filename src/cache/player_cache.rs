//! Player report cache backed by `moka`.
//!
//! Expiry is per entry, chosen by [`CachePolicy`] from the query shape.
//! Expired entries are never returned; [`PlayerCache::spawn_maintenance`]
//! additionally evicts them in the background so keys that are never read
//! again do not accumulate.
//!
//! Every entry is stored under the generation current when its fill
//! started. [`PlayerCache::clear`] moves to a new generation, so a fill
//! that straddles a clear can neither be served afterwards nor be joined
//! by lookups made after the clear.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{CachePolicy, PlayerCacheKey};
use crate::domain::PlayerReport;
use crate::error::AppError;

/// Shared cache of computed [`PlayerReport`]s.
#[derive(Debug)]
pub struct PlayerCache {
    reports: Cache<(u64, PlayerCacheKey), Arc<PlayerReport>>,
    generation: AtomicU64,
}

impl PlayerCache {
    /// Creates an empty cache whose TTLs follow `policy`.
    #[must_use]
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            reports: Cache::builder().expire_after(policy).build(),
            generation: AtomicU64::new(0),
        }
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Returns the live report cached for `key`.
    pub async fn get(&self, key: &PlayerCacheKey) -> Option<Arc<PlayerReport>> {
        self.reports.get(&(self.generation(), key.clone())).await
    }

    /// Stores `report` under `key`, replacing any previous entry.
    pub async fn insert(&self, key: PlayerCacheKey, report: Arc<PlayerReport>) {
        self.reports.insert((self.generation(), key), report).await;
    }

    /// Returns the cached report for `key`, or awaits `load` and caches
    /// its `Ok` result.
    ///
    /// Concurrent callers missing on the same key share one `load`; the
    /// futures of every caller but the first are dropped unpolled. Errors
    /// reach every waiter and are not cached.
    ///
    /// # Errors
    ///
    /// Returns the error produced by the shared `load`.
    pub async fn get_or_try_insert_with<F>(
        &self,
        key: PlayerCacheKey,
        load: F,
    ) -> Result<Arc<PlayerReport>, AppError>
    where
        F: Future<Output = Result<Arc<PlayerReport>, AppError>>,
    {
        let started = self.generation();
        let slot = (started, key);
        let report = self
            .reports
            .try_get_with(slot.clone(), load)
            .await
            .map_err(|err| (*err).clone())?;

        if self.generation() != started {
            // Cleared while loading; the entry is unreachable, drop it now.
            self.reports.invalidate(&slot).await;
        }
        Ok(report)
    }

    /// Drops every cached report, including those still being loaded.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.reports.invalidate_all();
    }

    /// Evicts expired and invalidated entries now.
    pub async fn run_maintenance(&self) {
        self.reports.run_pending_tasks().await;
    }

    /// Stored entries as of the last maintenance run.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.reports.entry_count()
    }

    /// Starts a background task running [`Self::run_maintenance`] every
    /// `every`.
    ///
    /// The task holds a weak reference and exits once the cache is dropped.
    pub fn spawn_maintenance(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);
        let every = every.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                cache.run_maintenance().await;
                tracing::trace!(entries = cache.entry_count(), "player cache maintenance");
            }
        })
    }
}
