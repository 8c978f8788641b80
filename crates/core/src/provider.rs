//! Provider trait implemented by the remote achievement API client

use async_trait::async_trait;
use crate::error::ProviderResult;
use crate::models::*;

/// Source of achievement data. Implementations map raw API responses into
/// the normalized models; nothing above this trait sees raw payloads.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Game the user is currently playing, if any
    async fn fetch_current_game(&self) -> ProviderResult<Option<GameSummary>>;

    /// Progress and objective status for a game
    async fn fetch_progress(&self, game_id: GameId) -> ProviderResult<GameProgress>;

    /// Unlocks within the last `lookback_minutes`, in any order
    async fn fetch_recent_unlocks(&self, lookback_minutes: u32) -> ProviderResult<Vec<UnlockEvent>>;

    /// Leaderboards available for a game
    async fn fetch_leaderboards(&self, game_id: GameId) -> ProviderResult<Vec<LeaderboardSummary>>;

    /// Top `top_n` entries of a leaderboard
    async fn fetch_leaderboard_entries(
        &self,
        leaderboard_id: LeaderboardId,
        top_n: u32,
    ) -> ProviderResult<LeaderboardPage>;

    /// The configured user's own entry on a leaderboard
    async fn fetch_viewer_rank(
        &self,
        game_id: GameId,
        leaderboard_id: LeaderboardId,
    ) -> ProviderResult<Option<LeaderboardEntry>>;
}
