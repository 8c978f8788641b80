//! Normalized data models shared by the provider client, engine and overlay

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

pub type GameId = u64;
pub type ObjectiveId = u64;
pub type LeaderboardId = u64;

/// Game currently being played
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    pub id: GameId,
    pub title: String,
    pub console_name: String,
    pub box_art_url: Option<String>,
}

/// A single achievement and whether the player has earned it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    pub id: ObjectiveId,
    pub title: String,
    pub description: String,
    pub points: u32,
    pub badge_url: Option<String>,
    pub earned_at: Option<DateTime<Utc>>,
}

impl Objective {
    pub fn is_earned(&self) -> bool {
        self.earned_at.is_some()
    }
}

/// Earned/total counts for the tracked game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub earned: u32,
    pub total: u32,
}

impl ProgressSummary {
    pub fn new(earned: u32, total: u32) -> Self {
        Self { earned: earned.min(total), total }
    }

    /// Rounded completion percentage, always within 0..=100
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = (self.earned.min(self.total) as f64 / self.total as f64 * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }
}

/// Result of a progress fetch: counts plus the objectives split by status.
/// Both lists keep the provider's display order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GameProgress {
    pub summary: ProgressSummary,
    pub remaining: Vec<Objective>,
    pub earned: Vec<Objective>,
}

/// An observed unlock, from either the progress fetch or the recent-unlocks feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockEvent {
    pub objective_id: ObjectiveId,
    pub game_id: GameId,
    pub title: String,
    pub description: String,
    pub points: u32,
    pub badge_url: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

impl UnlockEvent {
    pub fn from_objective(game_id: GameId, objective: &Objective) -> Self {
        Self {
            objective_id: objective.id,
            game_id,
            title: objective.title.clone(),
            description: objective.description.clone(),
            points: objective.points,
            badge_url: objective.badge_url.clone(),
            occurred_at: objective.earned_at,
        }
    }
}

/// How the next objective is chosen when nothing is pinned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortPolicy {
    /// First remaining objective in display order
    #[default]
    List,
    /// Cheapest remaining objective
    Lowest,
    /// Most valuable remaining objective
    Highest,
}

impl SortPolicy {
    /// Index into `remaining` of the objective this policy picks.
    /// Ties keep the earliest entry.
    pub fn pick(&self, remaining: &[Objective]) -> Option<usize> {
        if remaining.is_empty() {
            return None;
        }
        match self {
            SortPolicy::List => Some(0),
            SortPolicy::Lowest => remaining
                .iter()
                .enumerate()
                .fold(None, |best: Option<(usize, u32)>, (i, o)| match best {
                    Some((_, pts)) if pts <= o.points => best,
                    _ => Some((i, o.points)),
                })
                .map(|(i, _)| i),
            SortPolicy::Highest => remaining
                .iter()
                .enumerate()
                .fold(None, |best: Option<(usize, u32)>, (i, o)| match best {
                    Some((_, pts)) if pts >= o.points => best,
                    _ => Some((i, o.points)),
                })
                .map(|(i, _)| i),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortPolicy::List => "list",
            SortPolicy::Lowest => "lowest",
            SortPolicy::Highest => "highest",
        }
    }
}

impl std::str::FromStr for SortPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "list" => Ok(SortPolicy::List),
            "lowest" => Ok(SortPolicy::Lowest),
            "highest" => Ok(SortPolicy::Highest),
            other => Err(format!("unknown sort policy '{}'", other)),
        }
    }
}

// ============================================================================
// Leaderboards
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardSummary {
    pub id: LeaderboardId,
    pub title: String,
    pub description: String,
    pub rank_ascending: bool,
    pub score_format: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user: String,
    pub formatted_score: String,
    pub raw_score: i64,
}

/// One page of leaderboard entries as returned by the provider
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LeaderboardPage {
    pub entries: Vec<LeaderboardEntry>,
    pub total_entries: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardSnapshot {
    pub leaderboard_id: LeaderboardId,
    pub title: String,
    pub rank_ascending: bool,
    pub score_format: String,
    pub top_entries: Vec<LeaderboardEntry>,
    pub viewer_entry: Option<LeaderboardEntry>,
    pub total_entries: u32,
}

impl LeaderboardSnapshot {
    pub fn assemble(
        summary: &LeaderboardSummary,
        page: LeaderboardPage,
        viewer_entry: Option<LeaderboardEntry>,
    ) -> Self {
        Self {
            leaderboard_id: summary.id,
            title: summary.title.clone(),
            rank_ascending: summary.rank_ascending,
            score_format: summary.score_format.clone(),
            top_entries: page.entries,
            viewer_entry,
            total_entries: page.total_entries,
        }
    }
}

/// Provider health as last observed by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ProviderStatus {
    #[default]
    Ok,
    /// Credentials were rejected; polling keeps retrying
    AuthFailure { message: String },
    /// Last tick failed for a retryable reason
    Degraded { message: String },
}
