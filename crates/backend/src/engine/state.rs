//! Last-known session state owned by the reconciliation engine

use chrono::{DateTime, Utc};
use cheevo_core::*;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

/// Unlocks remembered as already announced before the oldest is forgotten
pub const ANNOUNCED_CAPACITY: usize = 512;

/// Unlock toasts kept for late joiners
pub const TOAST_HISTORY: usize = 5;

/// Insertion-ordered set of announced unlocks with a size cap. Objective ids
/// are only unique within a game, so entries are keyed by both.
#[derive(Debug, Clone, Default)]
pub struct AnnouncedSet {
    ids: HashSet<(GameId, ObjectiveId)>,
    order: VecDeque<(GameId, ObjectiveId)>,
}

impl AnnouncedSet {
    pub fn contains(&self, game_id: GameId, id: ObjectiveId) -> bool {
        self.ids.contains(&(game_id, id))
    }

    /// Returns false if the unlock was already present
    pub fn insert(&mut self, game_id: GameId, id: ObjectiveId) -> bool {
        let key = (game_id, id);
        if !self.ids.insert(key) {
            return false;
        }
        self.order.push_back(key);
        while self.order.len() > ANNOUNCED_CAPACITY {
            if let Some(old) = self.order.pop_front() {
                self.ids.remove(&old);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Objective the overlay is told to foreground
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextSelection {
    pub index: usize,
    pub objective: Objective,
    pub pinned: bool,
}

impl NextSelection {
    pub fn to_event(selection: Option<&NextSelection>, pinned: bool) -> OverlayEvent {
        match selection {
            Some(s) => OverlayEvent::Next {
                objective: Some(s.objective.clone()),
                index: Some(s.index),
                pinned: s.pinned,
            },
            None => OverlayEvent::Next { objective: None, index: None, pinned },
        }
    }
}

/// Leaderboard bookkeeping, committed separately from the rest of a tick
#[derive(Debug, Clone, Default)]
pub struct LeaderboardState {
    /// Game the `available` list was fetched for
    pub game_id: Option<GameId>,
    pub available: Vec<LeaderboardSummary>,
    pub listed_at: Option<DateTime<Utc>>,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub snapshot: Option<LeaderboardSnapshot>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub game: Option<GameSummary>,
    /// Last now-playing emitted was the waiting placeholder
    pub waiting: bool,
    pub progress: ProgressSummary,
    pub remaining: Vec<Objective>,
    /// Every id the provider has reported earned this game session
    pub earned_ids: HashSet<ObjectiveId>,
    pub announced: AnnouncedSet,
    /// Latest unlock time processed by either feed
    pub last_unlock_at: Option<DateTime<Utc>>,
    pub toasts: VecDeque<UnlockEvent>,
    pub next: Option<NextSelection>,
    pub leaderboards: LeaderboardState,
}

impl SessionState {
    pub fn tracked_game_id(&self) -> Option<GameId> {
        self.game.as_ref().map(|g| g.id)
    }

    /// Start tracking a different game. Everything per-game goes; the unlock
    /// time watermark survives since it only ever moves forward.
    pub fn reset_for_game(&mut self, game: GameSummary) {
        let last_unlock_at = self.last_unlock_at;
        *self = SessionState {
            game: Some(game),
            last_unlock_at,
            ..SessionState::default()
        };
    }

    pub fn push_toast(&mut self, unlock: UnlockEvent) {
        self.toasts.push_back(unlock);
        while self.toasts.len() > TOAST_HISTORY {
            self.toasts.pop_front();
        }
    }

    pub fn view(&self, provider: ProviderStatus) -> SessionView {
        SessionView {
            game: self.game.clone(),
            progress: self.progress,
            remaining: self.remaining.clone(),
            selected_index: self.next.as_ref().map(|n| n.index),
            pinned: self.next.as_ref().map(|n| n.pinned).unwrap_or(false),
            leaderboards: self.leaderboards.available.clone(),
            recent_unlocks: self.toasts.iter().cloned().collect(),
            provider,
        }
    }
}

/// Read-only copy of the committed state, published after every tick
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionView {
    pub game: Option<GameSummary>,
    pub progress: ProgressSummary,
    pub remaining: Vec<Objective>,
    pub selected_index: Option<usize>,
    pub pinned: bool,
    pub leaderboards: Vec<LeaderboardSummary>,
    pub recent_unlocks: Vec<UnlockEvent>,
    pub provider: ProviderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announced_set_evicts_oldest() {
        let mut set = AnnouncedSet::default();
        for id in 0..(ANNOUNCED_CAPACITY as u64 + 3) {
            assert!(set.insert(1, id));
        }
        assert_eq!(set.len(), ANNOUNCED_CAPACITY);
        assert!(!set.contains(1, 0));
        assert!(!set.contains(1, 2));
        assert!(set.contains(1, 3));
        assert!(!set.insert(1, 3));
    }

    #[test]
    fn announced_set_keeps_games_apart() {
        let mut set = AnnouncedSet::default();
        assert!(set.insert(2, 5));
        assert!(!set.contains(1, 5));
        assert!(set.insert(1, 5));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn toast_history_keeps_newest_five() {
        let mut state = SessionState::default();
        for id in 0..8 {
            state.push_toast(UnlockEvent {
                objective_id: id,
                game_id: 1,
                title: String::new(),
                description: String::new(),
                points: 0,
                badge_url: None,
                occurred_at: None,
            });
        }
        let ids: Vec<_> = state.toasts.iter().map(|t| t.objective_id).collect();
        assert_eq!(ids, vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn game_reset_keeps_only_the_watermark() {
        let mut state = SessionState::default();
        state.announced.insert(1, 5);
        state.earned_ids.insert(5);
        state.progress = ProgressSummary::new(1, 2);
        state.last_unlock_at = Some(Utc::now());
        state.reset_for_game(GameSummary {
            id: 2,
            title: "B".into(),
            console_name: String::new(),
            box_art_url: None,
        });
        assert!(state.announced.is_empty());
        assert!(state.earned_ids.is_empty());
        assert_eq!(state.progress, ProgressSummary::default());
        assert!(state.last_unlock_at.is_some());
        assert_eq!(state.tracked_game_id(), Some(2));
    }
}
