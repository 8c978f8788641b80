//! Scripted provider and fixtures shared by the backend tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cheevo_core::*;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
pub struct FakeData {
    pub game: Option<GameSummary>,
    pub progress: HashMap<GameId, GameProgress>,
    pub recent: Vec<UnlockEvent>,
    pub leaderboards: HashMap<GameId, Vec<LeaderboardSummary>>,
    pub pages: HashMap<LeaderboardId, LeaderboardPage>,
    pub viewer: HashMap<LeaderboardId, LeaderboardEntry>,
    pub fail_game: Option<ProviderError>,
    pub fail_progress: Option<ProviderError>,
    pub fail_recent: Option<ProviderError>,
    pub fail_leaderboards: Option<ProviderError>,
    pub calls: Vec<&'static str>,
}

#[derive(Default)]
pub struct FakeProvider {
    pub data: Mutex<FakeData>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_game(&self, game: Option<GameSummary>) {
        self.data.lock().game = game;
    }

    /// Progress for `game_id` built from `(id, points, earned_at)` triples
    pub fn set_objectives(&self, game_id: GameId, objectives: &[(ObjectiveId, u32, Option<DateTime<Utc>>)]) {
        let all: Vec<Objective> = objectives
            .iter()
            .map(|(id, points, earned_at)| Objective { earned_at: *earned_at, ..objective(*id, *points) })
            .collect();
        let (earned, remaining): (Vec<_>, Vec<_>) = all.into_iter().partition(Objective::is_earned);
        let total = (earned.len() + remaining.len()) as u32;
        self.data.lock().progress.insert(
            game_id,
            GameProgress {
                summary: ProgressSummary::new(earned.len() as u32, total),
                remaining,
                earned,
            },
        );
    }

    pub fn set_recent(&self, recent: Vec<UnlockEvent>) {
        self.data.lock().recent = recent;
    }

    pub fn calls(&self, name: &str) -> usize {
        self.data.lock().calls.iter().filter(|c| **c == name).count()
    }
}

#[async_trait]
impl Provider for FakeProvider {
    async fn fetch_current_game(&self) -> ProviderResult<Option<GameSummary>> {
        let mut data = self.data.lock();
        data.calls.push("game");
        match &data.fail_game {
            Some(e) => Err(e.clone()),
            None => Ok(data.game.clone()),
        }
    }

    async fn fetch_progress(&self, game_id: GameId) -> ProviderResult<GameProgress> {
        let mut data = self.data.lock();
        data.calls.push("progress");
        if let Some(e) = &data.fail_progress {
            return Err(e.clone());
        }
        Ok(data.progress.get(&game_id).cloned().unwrap_or_default())
    }

    async fn fetch_recent_unlocks(&self, _lookback_minutes: u32) -> ProviderResult<Vec<UnlockEvent>> {
        let mut data = self.data.lock();
        data.calls.push("recent");
        match &data.fail_recent {
            Some(e) => Err(e.clone()),
            None => Ok(data.recent.clone()),
        }
    }

    async fn fetch_leaderboards(&self, game_id: GameId) -> ProviderResult<Vec<LeaderboardSummary>> {
        let mut data = self.data.lock();
        data.calls.push("leaderboards");
        if let Some(e) = &data.fail_leaderboards {
            return Err(e.clone());
        }
        Ok(data.leaderboards.get(&game_id).cloned().unwrap_or_default())
    }

    async fn fetch_leaderboard_entries(
        &self,
        leaderboard_id: LeaderboardId,
        top_n: u32,
    ) -> ProviderResult<LeaderboardPage> {
        let mut data = self.data.lock();
        data.calls.push("entries");
        if let Some(e) = &data.fail_leaderboards {
            return Err(e.clone());
        }
        let mut page = data.pages.get(&leaderboard_id).cloned().unwrap_or_default();
        page.entries.truncate(top_n as usize);
        Ok(page)
    }

    async fn fetch_viewer_rank(
        &self,
        _game_id: GameId,
        leaderboard_id: LeaderboardId,
    ) -> ProviderResult<Option<LeaderboardEntry>> {
        let mut data = self.data.lock();
        data.calls.push("viewer");
        Ok(data.viewer.get(&leaderboard_id).cloned())
    }
}

pub fn game(id: GameId) -> GameSummary {
    GameSummary {
        id,
        title: format!("Game {}", id),
        console_name: "Test Console".into(),
        box_art_url: None,
    }
}

pub fn objective(id: ObjectiveId, points: u32) -> Objective {
    Objective {
        id,
        title: format!("Objective {}", id),
        description: String::new(),
        points,
        badge_url: None,
        earned_at: None,
    }
}

pub fn unlock(game_id: GameId, objective_id: ObjectiveId, at: DateTime<Utc>) -> UnlockEvent {
    UnlockEvent {
        objective_id,
        game_id,
        title: format!("Objective {}", objective_id),
        description: String::new(),
        points: 5,
        badge_url: None,
        occurred_at: Some(at),
    }
}

pub fn board(id: LeaderboardId) -> LeaderboardSummary {
    LeaderboardSummary {
        id,
        title: format!("Board {}", id),
        description: String::new(),
        rank_ascending: false,
        score_format: "SCORE".into(),
    }
}

pub fn snapshot(leaderboard_id: LeaderboardId) -> LeaderboardSnapshot {
    LeaderboardSnapshot::assemble(&board(leaderboard_id), LeaderboardPage::default(), None)
}
