//! REST routes for the control surface
//!
//! Writes only record the operator's intent; the engine picks them up on its
//! next tick.

use axum::{extract::State, Json};
use cheevo_core::{CommandResult, ControlState, LeaderboardCommand, NextCommand};
use std::sync::Arc;

use crate::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> String {
    format!("OK {}", state.broadcaster.session_count())
}

pub async fn get_control(State(state): State<Arc<AppState>>) -> Json<ControlState> {
    let view = state.view.borrow().clone();
    Json(ControlState {
        game: view.game,
        remaining: view.remaining,
        selected_index: view.selected_index,
        pinned: view.pinned,
        sort: state.sort,
        leaderboards: view.leaderboards,
        selected_leaderboard: state.overrides.selected_leaderboard(),
        provider: view.provider,
    })
}

pub async fn post_next(
    State(state): State<Arc<AppState>>,
    Json(command): Json<NextCommand>,
) -> Json<CommandResult> {
    let result = match &command {
        NextCommand::Select { id } => state.overrides.select(*id),
        NextCommand::CycleNext => state.overrides.cycle_next(),
        NextCommand::CyclePrevious => state.overrides.cycle_previous(),
        NextCommand::Clear => {
            state.overrides.clear_to_automatic();
            CommandResult::Ok
        }
    };
    tracing::info!(?command, ?result, "Next objective command");
    Json(result)
}

pub async fn post_leaderboard(
    State(state): State<Arc<AppState>>,
    Json(command): Json<LeaderboardCommand>,
) -> Json<CommandResult> {
    let result = state.overrides.select_leaderboard(command.id);
    if command.id.is_none() {
        state.broadcaster.forget_leaderboard();
    }
    tracing::info!(leaderboard_id = ?command.id, ?result, "Leaderboard selection");
    Json(result)
}
