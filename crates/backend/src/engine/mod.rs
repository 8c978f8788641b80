//! Reconciliation engine
//!
//! Each tick fetches fresh provider data, diffs it against the last-known
//! [`SessionState`] and returns the ordered events the overlays need. Ticks
//! are transactional: work happens on a copy of the state that is only
//! committed once every fetch of the tick succeeded. Leaderboards are a second
//! commit unit so a leaderboard outage never holds back unlock delivery.
//!
//! Unlocks come from two feeds. The progress fetch is the fast path; the
//! recent-unlocks feed is a wider backstop. Both are deduplicated through the
//! announced-id set plus an unlock-time watermark.

mod state;

pub use state::*;

use chrono::{DateTime, Duration, Utc};
use cheevo_core::*;
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::Config;
use crate::overrides::OverrideStore;

/// Unlocks older than this are backfill, not news
pub const FRESH_UNLOCK_WINDOW_MINUTES: i64 = 10;
pub const LEADERBOARD_LIST_INTERVAL_SECS: i64 = 120;
pub const LEADERBOARD_ENTRIES_INTERVAL_SECS: i64 = 30;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub sort: SortPolicy,
    pub backup_lookback_minutes: u32,
    pub leaderboard_top: u32,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sort: config.next_sort,
            backup_lookback_minutes: config.backup_lookback_minutes,
            leaderboard_top: config.leaderboard_top,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sort: SortPolicy::List,
            backup_lookback_minutes: 60,
            leaderboard_top: 10,
        }
    }
}

struct TickOutcome {
    switched: bool,
}

pub struct Engine {
    state: SessionState,
    settings: EngineSettings,
    overrides: Arc<OverrideStore>,
    status: ProviderStatus,
    view_tx: watch::Sender<SessionView>,
}

impl Engine {
    pub fn new(
        settings: EngineSettings,
        overrides: Arc<OverrideStore>,
        view_tx: watch::Sender<SessionView>,
    ) -> Self {
        Self {
            state: SessionState::default(),
            settings,
            overrides,
            status: ProviderStatus::Ok,
            view_tx,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn status(&self) -> &ProviderStatus {
        &self.status
    }

    /// Run one reconciliation tick. Returns nothing if the tick failed; the
    /// last committed state is then left untouched.
    pub async fn tick(&mut self, provider: &dyn Provider, now: DateTime<Utc>) -> Vec<OverlayEvent> {
        let mut work = self.state.clone();
        let mut events = Vec::new();

        match self.reconcile(&mut work, provider, now, &mut events).await {
            Ok(outcome) => {
                if outcome.switched {
                    self.overrides.clear_to_automatic();
                }
                self.state = work;
                self.record_success();
            }
            Err(e) => {
                self.record_failure("reconcile", &e);
                self.publish_view();
                return Vec::new();
            }
        }

        if self.state.game.is_some() && !self.state.waiting {
            events.extend(self.refresh_leaderboards(provider, now).await);
        }

        tracing::debug!(events = events.len(), "Tick committed");
        self.publish_view();
        events
    }

    async fn reconcile(
        &self,
        work: &mut SessionState,
        provider: &dyn Provider,
        now: DateTime<Utc>,
        events: &mut Vec<OverlayEvent>,
    ) -> ProviderResult<TickOutcome> {
        let Some(game) = provider.fetch_current_game().await? else {
            if !work.waiting {
                tracing::info!("No game running, waiting");
                work.waiting = true;
            }
            events.push(OverlayEvent::waiting());
            return Ok(TickOutcome { switched: false });
        };

        let switched = work.tracked_game_id() != Some(game.id);
        let mut force_progress = false;
        if switched {
            tracing::info!(game_id = game.id, title = %game.title, "Now tracking game");
            work.reset_for_game(game.clone());
            events.push(OverlayEvent::now_playing(game.clone()));
            force_progress = true;
        } else if work.waiting || work.game.as_ref() != Some(&game) {
            if work.waiting {
                // Overlays dropped everything on waiting; resend it all
                force_progress = true;
                work.leaderboards.refreshed_at = None;
            }
            work.game = Some(game.clone());
            events.push(OverlayEvent::now_playing(game.clone()));
        }
        work.waiting = false;

        // Progress and Remaining
        let fetched = provider.fetch_progress(game.id).await?;
        work.earned_ids.extend(fetched.earned.iter().map(|o| o.id));
        let remaining: Vec<Objective> = fetched
            .remaining
            .iter()
            .filter(|o| !work.earned_ids.contains(&o.id) && !work.announced.contains(game.id, o.id))
            .cloned()
            .collect();
        work.remaining = remaining;

        let progress = ProgressSummary::new(
            fetched.summary.earned.max(work.progress.earned),
            fetched.summary.total,
        );
        if force_progress || progress != work.progress {
            work.progress = progress;
            events.push(OverlayEvent::progress(progress));
        }
        events.push(remaining_event(game.id, &work.remaining));

        // Fast path: objectives the progress fetch reports as earned
        let mut newly_earned: Vec<&Objective> = fetched
            .earned
            .iter()
            .filter(|o| !work.announced.contains(game.id, o.id))
            .collect();
        newly_earned.sort_by_key(|o| o.earned_at);
        for objective in newly_earned {
            if is_fresh(objective.earned_at, now) {
                announce(work, UnlockEvent::from_objective(game.id, objective), events);
            }
        }

        // Next objective. Recomputed and re-sent whenever Remaining is.
        let pin = if switched { None } else { self.overrides.pinned_index() };
        work.next = select_next(&work.remaining, pin, self.settings.sort);
        events.push(NextSelection::to_event(work.next.as_ref(), pin.is_some()));

        // Backup feed
        let mut unlocks = provider
            .fetch_recent_unlocks(self.settings.backup_lookback_minutes)
            .await?;
        unlocks.sort_by_key(|u| u.occurred_at);

        let progress_before = work.progress;
        let mut remaining_changed = false;
        for unlock in unlocks {
            let tracked = unlock.game_id == game.id;
            let already = work.announced.contains(unlock.game_id, unlock.objective_id);
            if already {
                let newer = match (unlock.occurred_at, work.last_unlock_at) {
                    (Some(at), Some(mark)) => at > mark,
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                if !newer {
                    continue;
                }
            } else if tracked && work.earned_ids.contains(&unlock.objective_id) {
                // Progress fetch already knew about it and judged it stale
                continue;
            } else if !tracked && !is_fresh(unlock.occurred_at, now) {
                continue;
            }

            if tracked && !already {
                work.earned_ids.insert(unlock.objective_id);
                let before = work.remaining.len();
                work.remaining.retain(|o| o.id != unlock.objective_id);
                remaining_changed |= work.remaining.len() != before;
                work.progress = ProgressSummary::new(work.progress.earned + 1, work.progress.total);
            }
            announce(work, unlock, events);
        }

        if work.progress != progress_before {
            events.push(OverlayEvent::progress(work.progress));
        }
        if remaining_changed {
            events.push(remaining_event(game.id, &work.remaining));
            work.next = select_next(&work.remaining, pin, self.settings.sort);
            events.push(NextSelection::to_event(work.next.as_ref(), pin.is_some()));
        }

        Ok(TickOutcome { switched })
    }

    async fn refresh_leaderboards(&mut self, provider: &dyn Provider, now: DateTime<Utc>) -> Option<OverlayEvent> {
        let game_id = self.state.tracked_game_id()?;
        let mut boards = self.state.leaderboards.clone();
        match self.update_leaderboards(&mut boards, game_id, provider, now).await {
            Ok(event) => {
                self.state.leaderboards = boards;
                event
            }
            Err(e) => {
                self.record_failure("leaderboards", &e);
                None
            }
        }
    }

    async fn update_leaderboards(
        &self,
        boards: &mut LeaderboardState,
        game_id: GameId,
        provider: &dyn Provider,
        now: DateTime<Utc>,
    ) -> ProviderResult<Option<OverlayEvent>> {
        if boards.game_id != Some(game_id) || is_due(boards.listed_at, now, LEADERBOARD_LIST_INTERVAL_SECS) {
            boards.available = provider.fetch_leaderboards(game_id).await?;
            boards.game_id = Some(game_id);
            boards.listed_at = Some(now);
            tracing::debug!(game_id, count = boards.available.len(), "Leaderboard list refreshed");
        }

        let selected = self.overrides.retain_leaderboard(&boards.available);
        let Some(summary) = selected.and_then(|id| boards.available.iter().find(|lb| lb.id == id).cloned()) else {
            boards.snapshot = None;
            return Ok(None);
        };

        let same_board = boards.snapshot.as_ref().map(|s| s.leaderboard_id) == Some(summary.id);
        if same_board && !is_due(boards.refreshed_at, now, LEADERBOARD_ENTRIES_INTERVAL_SECS) {
            return Ok(None);
        }

        let page = provider
            .fetch_leaderboard_entries(summary.id, self.settings.leaderboard_top)
            .await?;
        let viewer = provider.fetch_viewer_rank(game_id, summary.id).await?;
        let snapshot = LeaderboardSnapshot::assemble(&summary, page, viewer);
        boards.refreshed_at = Some(now);
        boards.snapshot = Some(snapshot.clone());
        Ok(Some(OverlayEvent::Leaderboard(snapshot)))
    }

    fn record_success(&mut self) {
        if matches!(self.status, ProviderStatus::AuthFailure { .. }) {
            tracing::info!("Provider accepted credentials again");
        }
        self.status = ProviderStatus::Ok;
    }

    fn record_failure(&mut self, phase: &'static str, error: &ProviderError) {
        match error {
            ProviderError::AuthFailure(message) => {
                if !matches!(self.status, ProviderStatus::AuthFailure { .. }) {
                    tracing::warn!(phase, "Provider rejected credentials, still polling: {}", message);
                }
                self.status = ProviderStatus::AuthFailure { message: message.clone() };
            }
            ProviderError::Malformed(detail) => {
                tracing::warn!(phase, kind = error.kind(), "Unexpected provider response: {}", detail);
                self.status = ProviderStatus::Degraded { message: error.to_string() };
            }
            ProviderError::Transient(detail) => {
                tracing::warn!(phase, kind = error.kind(), "Provider call failed: {}", detail);
                self.status = ProviderStatus::Degraded { message: error.to_string() };
            }
        }
    }

    fn publish_view(&self) {
        self.view_tx.send_replace(self.state.view(self.status.clone()));
    }
}

/// Pick the objective to foreground. A pin past the end of a shrunken list
/// clamps to the last entry.
pub fn select_next(remaining: &[Objective], pin: Option<usize>, sort: SortPolicy) -> Option<NextSelection> {
    if remaining.is_empty() {
        return None;
    }
    let (index, pinned) = match pin {
        Some(p) => (p.min(remaining.len() - 1), true),
        None => (sort.pick(remaining)?, false),
    };
    Some(NextSelection {
        index,
        objective: remaining[index].clone(),
        pinned,
    })
}

fn remaining_event(game_id: GameId, remaining: &[Objective]) -> OverlayEvent {
    OverlayEvent::Remaining {
        game_id,
        objectives: remaining.to_vec(),
    }
}

fn announce(work: &mut SessionState, unlock: UnlockEvent, events: &mut Vec<OverlayEvent>) {
    tracing::info!(
        objective_id = unlock.objective_id,
        game_id = unlock.game_id,
        title = %unlock.title,
        "Achievement unlocked"
    );
    work.announced.insert(unlock.game_id, unlock.objective_id);
    if let Some(at) = unlock.occurred_at {
        work.last_unlock_at = Some(work.last_unlock_at.map_or(at, |mark| mark.max(at)));
    }
    work.push_toast(unlock.clone());
    events.push(OverlayEvent::Achievement(unlock));
}

fn is_fresh(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match at {
        Some(at) => now.signed_duration_since(at) <= Duration::minutes(FRESH_UNLOCK_WINDOW_MINUTES),
        None => true,
    }
}

fn is_due(last: Option<DateTime<Utc>>, now: DateTime<Utc>, interval_secs: i64) -> bool {
    last.map_or(true, |at| now.signed_duration_since(at) >= Duration::seconds(interval_secs))
}
