//! Push events for overlay viewers and control-surface messages

use serde::{Deserialize, Serialize};
use crate::models::*;

/// Events pushed from the server to every connected overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OverlayEvent {
    /// Game currently being played, or `waiting` when nothing is running
    NowPlaying {
        waiting: bool,
        game: Option<GameSummary>,
    },

    /// Completion counts for the tracked game
    Progress {
        earned: u32,
        total: u32,
        percent: u8,
    },

    /// Objectives not yet earned, in display order
    Remaining {
        game_id: GameId,
        objectives: Vec<Objective>,
    },

    /// Objective the overlay should foreground
    Next {
        objective: Option<Objective>,
        index: Option<usize>,
        pinned: bool,
    },

    /// A newly observed unlock
    Achievement(UnlockEvent),

    /// Standings for the selected leaderboard
    Leaderboard(LeaderboardSnapshot),

    /// Reply to a viewer keep-alive
    Pong,
}

impl OverlayEvent {
    pub fn waiting() -> Self {
        OverlayEvent::NowPlaying { waiting: true, game: None }
    }

    pub fn now_playing(game: GameSummary) -> Self {
        OverlayEvent::NowPlaying { waiting: false, game: Some(game) }
    }

    pub fn progress(summary: ProgressSummary) -> Self {
        OverlayEvent::Progress {
            earned: summary.earned,
            total: summary.total,
            percent: summary.percent(),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            OverlayEvent::NowPlaying { .. } => EventKind::NowPlaying,
            OverlayEvent::Progress { .. } => EventKind::Progress,
            OverlayEvent::Remaining { .. } => EventKind::Remaining,
            OverlayEvent::Next { .. } => EventKind::Next,
            OverlayEvent::Achievement(_) => EventKind::Achievement,
            OverlayEvent::Leaderboard(_) => EventKind::Leaderboard,
            OverlayEvent::Pong => EventKind::Pong,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NowPlaying,
    Progress,
    Remaining,
    Next,
    Achievement,
    Leaderboard,
    Pong,
}

/// Messages an overlay viewer may send
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ViewerMessage {
    Ping,
}

// ============================================================================
// Control surface
// ============================================================================

/// Manual next-objective commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum NextCommand {
    Select { id: ObjectiveId },
    CycleNext,
    CyclePrevious,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardCommand {
    pub id: Option<LeaderboardId>,
}

/// Outcome of a control command. Commands take effect on the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandResult {
    Ok,
    NotFound,
    Empty,
}

/// Everything the control surface needs to render itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
    pub game: Option<GameSummary>,
    pub remaining: Vec<Objective>,
    pub selected_index: Option<usize>,
    pub pinned: bool,
    pub sort: SortPolicy,
    pub leaderboards: Vec<LeaderboardSummary>,
    pub selected_leaderboard: Option<LeaderboardId>,
    pub provider: ProviderStatus,
}
