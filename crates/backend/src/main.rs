//! Achievement overlay server
//!
//! Provides:
//! - Poll loop reconciling the achievement API against last-known state
//! - WebSocket push stream for browser overlays
//! - REST control surface for next-objective and leaderboard overrides

mod api_client;
mod api_fields;
mod broadcaster;
mod config;
mod engine;
mod overrides;
mod routes;
mod scheduler;
mod ws_handler;

#[cfg(test)]
mod test_support;

use axum::{
    routing::{get, post},
    Router,
};
use cheevo_core::{Provider, SortPolicy};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::broadcaster::Broadcaster;
use crate::config::Config;
use crate::engine::{Engine, EngineSettings, SessionView};
use crate::overrides::OverrideStore;
use crate::scheduler::PollJob;

pub struct AppState {
    pub broadcaster: Arc<Broadcaster>,
    pub overrides: Arc<OverrideStore>,
    pub view: watch::Receiver<SessionView>,
    pub sort: SortPolicy,
    pub shutdown: watch::Receiver<bool>,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        // Overlay push stream
        .route("/ws", get(ws_handler::ws_handler))
        // Control surface
        .route("/api/control", get(routes::get_control))
        .route("/api/control/next", post(routes::post_next))
        .route("/api/control/leaderboard", post(routes::post_leaderboard))
        .with_state(state)
        .layer(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "cheevo_backend=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::load().and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let provider: Arc<dyn Provider> = match api_client::ApiClient::new(&config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (view_tx, view_rx) = watch::channel(SessionView::default());
    let broadcaster = Arc::new(Broadcaster::new());
    let overrides = Arc::new(OverrideStore::new(view_rx.clone()));

    let engine = Engine::new(EngineSettings::from_config(&config), overrides.clone(), view_tx);
    let job = PollJob {
        engine,
        provider,
        broadcaster: broadcaster.clone(),
    };
    let poller = tokio::spawn(scheduler::run(config.poll_interval(), shutdown_rx.clone(), job));

    let state = Arc::new(AppState {
        broadcaster,
        overrides,
        view: view_rx,
        sort: config.next_sort,
        shutdown: shutdown_rx.clone(),
    });

    let listener = match tokio::net::TcpListener::bind(&config.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.bind_address, e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        user = %config.username,
        sort = config.next_sort.label(),
        "Overlay server listening on {}",
        config.bind_address
    );

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        tracing::info!("Shutting down");
        let _ = shutdown_tx.send(true);
    });

    let mut server_shutdown = shutdown_rx;
    let served = axum::serve(listener, app(state))
        .with_graceful_shutdown(async move { scheduler::stopped(&mut server_shutdown).await })
        .await;
    if let Err(e) = served {
        tracing::error!("Server error: {}", e);
    }

    let _ = poller.await;
}
