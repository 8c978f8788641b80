//! Fixed-interval poll loop
//!
//! The first tick fires one period after start. Ticks never overlap: a tick
//! that overruns the period is followed immediately by the next one, after
//! which the cadence restarts from that point.

use async_trait::async_trait;
use chrono::Utc;
use cheevo_core::Provider;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::broadcaster::Broadcaster;
use crate::engine::Engine;

/// One unit of scheduled work
#[async_trait]
pub trait Tick: Send {
    async fn tick(&mut self);
}

/// Resolves once `shutdown` is true or its sender is gone
pub async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Run `job` every `period` until `shutdown` flips to true (or its sender is
/// dropped). A tick in flight when shutdown arrives is abandoned.
pub async fn run<T: Tick>(period: Duration, mut shutdown: watch::Receiver<bool>, mut job: T) {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(period_secs = period.as_secs(), "Poll scheduler started");

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = stopped(&mut shutdown) => break,
        }
        tokio::select! {
            _ = job.tick() => {}
            _ = stopped(&mut shutdown) => break,
        }
    }

    tracing::info!("Poll scheduler stopped");
}

/// Reconciliation tick: poll the provider and publish whatever changed
pub struct PollJob {
    pub engine: Engine,
    pub provider: Arc<dyn Provider>,
    pub broadcaster: Arc<Broadcaster>,
}

#[async_trait]
impl Tick for PollJob {
    async fn tick(&mut self) {
        let events = self.engine.tick(self.provider.as_ref(), Utc::now()).await;
        for event in events {
            self.broadcaster.publish(event);
        }
    }
}
