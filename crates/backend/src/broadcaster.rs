//! Fan-out of overlay events to connected viewer sessions
//!
//! Each session gets its own small bounded queue; a session that falls a full
//! queue behind is dropped and its socket closed. New sessions are first fed
//! the replay buffer (latest now-playing, progress, remaining, next, newest
//! achievement, leaderboard) under the same lock that live publishing takes,
//! so nothing can slip in between the replay and the live stream.

use cheevo_core::{EventKind, GameId, OverlayEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc::{self, error::TrySendError};

pub type SessionId = u64;

/// Events a session may have outstanding before it counts as stalled
pub const SESSION_QUEUE: usize = 64;

/// Handle returned to a newly connected viewer
pub struct Subscription {
    pub id: SessionId,
    pub events: mpsc::Receiver<OverlayEvent>,
}

#[derive(Default)]
struct ReplayBuffer {
    now_playing: Option<OverlayEvent>,
    progress: Option<OverlayEvent>,
    remaining: Option<OverlayEvent>,
    next: Option<OverlayEvent>,
    achievement: Option<OverlayEvent>,
    leaderboard: Option<OverlayEvent>,
}

impl ReplayBuffer {
    fn record(&mut self, event: &OverlayEvent) {
        match event {
            OverlayEvent::NowPlaying { game, .. } => {
                if playing_id(self.now_playing.as_ref()) != game.as_ref().map(|g| g.id) {
                    self.clear_game_state();
                }
                self.now_playing = Some(event.clone());
            }
            OverlayEvent::Progress { .. } => self.progress = Some(event.clone()),
            OverlayEvent::Remaining { .. } => self.remaining = Some(event.clone()),
            OverlayEvent::Next { .. } => self.next = Some(event.clone()),
            OverlayEvent::Achievement(_) => self.achievement = Some(event.clone()),
            OverlayEvent::Leaderboard(_) => self.leaderboard = Some(event.clone()),
            OverlayEvent::Pong => {}
        }
    }

    fn clear_game_state(&mut self) {
        self.progress = None;
        self.remaining = None;
        self.next = None;
        self.achievement = None;
        self.leaderboard = None;
    }

    fn events(&self) -> impl Iterator<Item = &OverlayEvent> {
        [
            &self.now_playing,
            &self.progress,
            &self.remaining,
            &self.next,
            &self.achievement,
            &self.leaderboard,
        ]
        .into_iter()
        .flatten()
    }
}

fn playing_id(event: Option<&OverlayEvent>) -> Option<GameId> {
    match event {
        Some(OverlayEvent::NowPlaying { game: Some(game), .. }) => Some(game.id),
        _ => None,
    }
}

#[derive(Default)]
struct Registry {
    next_id: SessionId,
    sessions: HashMap<SessionId, mpsc::Sender<OverlayEvent>>,
    replay: ReplayBuffer,
}

#[derive(Default)]
pub struct Broadcaster {
    inner: Mutex<Registry>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a viewer and queue the replay for it
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SESSION_QUEUE);
        let mut inner = self.inner.lock();
        for event in inner.replay.events() {
            let _ = tx.try_send(event.clone());
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.sessions.insert(id, tx);
        tracing::info!(session = id, viewers = inner.sessions.len(), "Overlay connected");
        Subscription { id, events: rx }
    }

    pub fn unsubscribe(&self, id: SessionId) {
        let mut inner = self.inner.lock();
        if inner.sessions.remove(&id).is_some() {
            tracing::info!(session = id, viewers = inner.sessions.len(), "Overlay disconnected");
        }
    }

    /// Record `event` for late joiners and push it to every session. Sessions
    /// whose receiver is gone or whose queue is full are dropped.
    pub fn publish(&self, event: OverlayEvent) {
        if event.kind() == EventKind::Pong {
            return;
        }
        let mut inner = self.inner.lock();
        inner.replay.record(&event);
        inner.sessions.retain(|id, tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(session = *id, "Dropping stalled overlay session");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(session = *id, "Dropping closed overlay session");
                false
            }
        });
    }

    /// Stop replaying the last leaderboard to new sessions
    pub fn forget_leaderboard(&self) {
        self.inner.lock().replay.leaderboard = None;
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{game, objective, snapshot, unlock};
    use cheevo_core::ProgressSummary;
    use chrono::Utc;
    use tokio::sync::mpsc::error::TryRecvError;

    fn drain(sub: &mut Subscription) -> Vec<OverlayEvent> {
        let mut out = Vec::new();
        while let Ok(event) = sub.events.try_recv() {
            out.push(event);
        }
        out
    }

    fn next_event(id: u64) -> OverlayEvent {
        OverlayEvent::Next { objective: Some(objective(id, 5)), index: Some(0), pinned: false }
    }

    fn remaining_event(ids: &[u64]) -> OverlayEvent {
        OverlayEvent::Remaining {
            game_id: 1,
            objectives: ids.iter().map(|id| objective(*id, 5)).collect(),
        }
    }

    #[test]
    fn late_joiner_gets_replay_in_fixed_order() {
        let hub = Broadcaster::new();
        let now = Utc::now();
        hub.publish(OverlayEvent::now_playing(game(1)));
        hub.publish(OverlayEvent::progress(ProgressSummary::new(1, 4)));
        hub.publish(remaining_event(&[2, 3, 4]));
        hub.publish(OverlayEvent::Achievement(unlock(1, 10, now)));
        hub.publish(next_event(2));
        hub.publish(OverlayEvent::Achievement(unlock(1, 11, now)));
        hub.publish(OverlayEvent::progress(ProgressSummary::new(2, 4)));

        let mut sub = hub.subscribe();
        let replay = drain(&mut sub);
        assert_eq!(
            replay,
            vec![
                OverlayEvent::now_playing(game(1)),
                OverlayEvent::progress(ProgressSummary::new(2, 4)),
                remaining_event(&[2, 3, 4]),
                next_event(2),
                OverlayEvent::Achievement(unlock(1, 11, now)),
            ]
        );
    }

    #[test]
    fn live_events_follow_replay_for_every_session() {
        let hub = Broadcaster::new();
        hub.publish(OverlayEvent::now_playing(game(1)));
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        assert_eq!(hub.session_count(), 2);

        hub.publish(OverlayEvent::progress(ProgressSummary::new(1, 2)));
        let expected = vec![
            OverlayEvent::now_playing(game(1)),
            OverlayEvent::progress(ProgressSummary::new(1, 2)),
        ];
        assert_eq!(drain(&mut a), expected);
        assert_eq!(drain(&mut b), expected);
    }

    #[test]
    fn closed_sessions_are_dropped_on_publish() {
        let hub = Broadcaster::new();
        let a = hub.subscribe();
        let mut b = hub.subscribe();
        drop(a);
        hub.publish(OverlayEvent::waiting());
        assert_eq!(hub.session_count(), 1);
        assert_eq!(drain(&mut b), vec![OverlayEvent::waiting()]);

        hub.unsubscribe(b.id);
        assert_eq!(hub.session_count(), 0);
    }

    #[test]
    fn game_switch_forgets_previous_game_replay() {
        let hub = Broadcaster::new();
        hub.publish(OverlayEvent::now_playing(game(1)));
        hub.publish(OverlayEvent::progress(ProgressSummary::new(3, 4)));
        hub.publish(OverlayEvent::Achievement(unlock(1, 10, Utc::now())));
        hub.publish(OverlayEvent::now_playing(game(2)));

        let mut sub = hub.subscribe();
        assert_eq!(drain(&mut sub), vec![OverlayEvent::now_playing(game(2))]);

        hub.publish(OverlayEvent::waiting());
        let mut sub = hub.subscribe();
        assert_eq!(drain(&mut sub), vec![OverlayEvent::waiting()]);
    }

    #[test]
    fn stalled_session_is_dropped_once_its_queue_fills() {
        let hub = Broadcaster::new();
        let mut stalled = hub.subscribe();
        let mut live = hub.subscribe();

        for n in 0..SESSION_QUEUE as u32 {
            hub.publish(OverlayEvent::progress(ProgressSummary::new(n, 1000)));
            assert_eq!(drain(&mut live).len(), 1);
        }
        assert_eq!(hub.session_count(), 2);

        hub.publish(OverlayEvent::progress(ProgressSummary::new(999, 1000)));
        assert_eq!(hub.session_count(), 1);
        assert_eq!(drain(&mut live).len(), 1);

        // The stalled viewer still gets what was queued, then the stream ends
        assert_eq!(drain(&mut stalled).len(), SESSION_QUEUE);
        assert_eq!(stalled.events.try_recv(), Err(TryRecvError::Disconnected));
    }

    #[test]
    fn forgotten_leaderboard_is_not_replayed() {
        let hub = Broadcaster::new();
        hub.publish(OverlayEvent::now_playing(game(1)));
        hub.publish(OverlayEvent::Leaderboard(snapshot(3)));
        assert_eq!(drain(&mut hub.subscribe()).len(), 2);

        hub.forget_leaderboard();
        assert_eq!(drain(&mut hub.subscribe()), vec![OverlayEvent::now_playing(game(1))]);
    }

    #[test]
    fn same_game_now_playing_keeps_replay() {
        let hub = Broadcaster::new();
        hub.publish(OverlayEvent::now_playing(game(1)));
        hub.publish(OverlayEvent::progress(ProgressSummary::new(1, 4)));
        hub.publish(OverlayEvent::now_playing(game(1)));
        let mut sub = hub.subscribe();
        assert_eq!(drain(&mut sub).len(), 2);
    }
}
