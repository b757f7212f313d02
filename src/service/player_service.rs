//! Cached player read path.

use std::sync::Arc;

use crate::cache::{PlayerCache, PlayerCacheKey};
use crate::domain::field_mapping::room_code_for;
use crate::domain::{DateRange, PlayerReport};
use crate::error::AppError;
use crate::persistence::StatsStore;

/// Serves [`PlayerReport`]s through the shared [`PlayerCache`].
#[derive(Debug, Clone)]
pub struct PlayerService {
    store: Arc<dyn StatsStore>,
    cache: Arc<PlayerCache>,
}

impl PlayerService {
    /// Creates a service reading `store` through `cache`.
    #[must_use]
    pub fn new(store: Arc<dyn StatsStore>, cache: Arc<PlayerCache>) -> Self {
        Self { store, cache }
    }

    /// Returns the report for `player_name` in `room`, optionally limited to
    /// `range`. `room` may be a room code or any known site label.
    ///
    /// Concurrent misses for the same query share one store read.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for a blank room or player,
    /// [`AppError::NotFound`] when no snapshot matches, or a persistence
    /// error from the store.
    pub async fn player_report(
        &self,
        room: &str,
        player_name: &str,
        range: Option<DateRange>,
    ) -> Result<Arc<PlayerReport>, AppError> {
        let player_name = player_name.trim();
        let (Some(room), false) = (room_code_for(room), player_name.is_empty()) else {
            return Err(AppError::InvalidRequest(
                "room and player name are required".to_string(),
            ));
        };

        let key = PlayerCacheKey::new(&room, player_name, range);
        let store = Arc::clone(&self.store);
        let player_name = player_name.to_string();

        self.cache
            .get_or_try_insert_with(key, async move {
                let snapshots = store.player_snapshots(&room, &player_name, range).await?;
                if snapshots.is_empty() {
                    return Err(AppError::NotFound(format!(
                        "no statistics for player '{player_name}' in room {room}"
                    )));
                }
                tracing::debug!(%room, player = %player_name, rows = snapshots.len(), "player report computed");
                Ok(Arc::new(PlayerReport::build(&room, &player_name, range, snapshots)))
            })
            .await
    }

    /// Drops every cached report.
    pub fn clear_cache(&self) {
        self.cache.clear();
        tracing::info!("player cache cleared");
    }
}
