//! WebSocket handler for overlay viewers

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use cheevo_core::{OverlayEvent, ViewerMessage};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;

use crate::broadcaster::{Broadcaster, Subscription};
use crate::scheduler::stopped;
use crate::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

fn encode(event: &OverlayEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            tracing::error!("Failed to serialize {:?} event: {}", event.kind(), e);
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, receiver) = socket.split();
    run_session(sender, receiver, &state.broadcaster, state.shutdown.clone()).await;
}

/// Pump broadcaster events out and answer viewer pings. Ends when the viewer
/// goes away or the broadcaster drops the session, and on shutdown.
async fn run_session<S, R>(
    mut sender: S,
    mut receiver: R,
    broadcaster: &Broadcaster,
    mut shutdown: watch::Receiver<bool>,
) where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let Subscription { id, mut events } = broadcaster.subscribe();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let Some(message) = encode(&event) else { continue };
                if sender.send(message).await.is_err() {
                    break;
                }
            }
            msg = receiver.next() => {
                let reply = match msg {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ViewerMessage>(text.as_str()) {
                        Ok(ViewerMessage::Ping) => encode(&OverlayEvent::Pong),
                        Err(e) => {
                            tracing::debug!(session = id, "Ignoring viewer message: {}", e);
                            None
                        }
                    },
                    Some(Ok(Message::Ping(data))) => Some(Message::Pong(data)),
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => None,
                };
                if let Some(reply) = reply {
                    if sender.send(reply).await.is_err() {
                        break;
                    }
                }
            }
            _ = stopped(&mut shutdown) => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    broadcaster.unsubscribe(id);
}
