//! Operator overrides: pinned next objective and leaderboard selection
//!
//! Written by the control routes at any time, read by the engine at the start
//! of its next-objective step. Reads are last-write-wins; nothing here is
//! pushed to viewers directly.

use cheevo_core::{CommandResult, LeaderboardId, LeaderboardSummary, ObjectiveId};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::engine::SessionView;

#[derive(Debug, Default)]
struct Overrides {
    /// Index into the engine's Remaining list
    pin: Option<usize>,
    leaderboard: Option<LeaderboardId>,
}

pub struct OverrideStore {
    inner: Mutex<Overrides>,
    view: watch::Receiver<SessionView>,
}

impl OverrideStore {
    /// `view` is the engine's committed snapshot; ids and cycling resolve
    /// against its Remaining list.
    pub fn new(view: watch::Receiver<SessionView>) -> Self {
        Self {
            inner: Mutex::new(Overrides::default()),
            view,
        }
    }

    /// Pin the objective with `id` at its current position in Remaining
    pub fn select(&self, id: ObjectiveId) -> CommandResult {
        let position = self.view.borrow().remaining.iter().position(|o| o.id == id);
        match position {
            Some(index) => {
                self.inner.lock().pin = Some(index);
                CommandResult::Ok
            }
            None => CommandResult::NotFound,
        }
    }

    pub fn cycle_next(&self) -> CommandResult {
        self.cycle(1)
    }

    pub fn cycle_previous(&self) -> CommandResult {
        self.cycle(-1)
    }

    fn cycle(&self, step: isize) -> CommandResult {
        let (len, selected) = {
            let view = self.view.borrow();
            (view.remaining.len(), view.selected_index)
        };
        if len == 0 {
            return CommandResult::Empty;
        }
        let mut inner = self.inner.lock();
        let current = inner.pin.or(selected).unwrap_or(0).min(len - 1);
        let next = (current as isize + step).rem_euclid(len as isize) as usize;
        inner.pin = Some(next);
        CommandResult::Ok
    }

    pub fn clear_to_automatic(&self) {
        self.inner.lock().pin = None;
    }

    pub fn pinned_index(&self) -> Option<usize> {
        self.inner.lock().pin
    }

    /// `None` clears the selection. Ids are checked against the known list
    /// once one has been loaded.
    pub fn select_leaderboard(&self, id: Option<LeaderboardId>) -> CommandResult {
        let Some(id) = id else {
            self.inner.lock().leaderboard = None;
            return CommandResult::Ok;
        };
        let known = {
            let view = self.view.borrow();
            view.leaderboards.is_empty() || view.leaderboards.iter().any(|lb| lb.id == id)
        };
        if !known {
            return CommandResult::NotFound;
        }
        self.inner.lock().leaderboard = Some(id);
        CommandResult::Ok
    }

    pub fn selected_leaderboard(&self) -> Option<LeaderboardId> {
        self.inner.lock().leaderboard
    }

    /// Drop the leaderboard selection if `available` does not offer it.
    /// Returns the selection that remains.
    pub fn retain_leaderboard(&self, available: &[LeaderboardSummary]) -> Option<LeaderboardId> {
        let mut inner = self.inner.lock();
        if let Some(id) = inner.leaderboard {
            if !available.iter().any(|lb| lb.id == id) {
                tracing::info!(leaderboard_id = id, "Selected leaderboard not offered by this game, clearing");
                inner.leaderboard = None;
            }
        }
        inner.leaderboard
    }
}
