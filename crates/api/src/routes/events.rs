//! Live karma event stream

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use common::KarmaEvent;
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    /// Only forward events for this user
    user_id: Option<Uuid>,
}

pub async fn stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let rx = state.bus.subscribe();
    ws.on_upgrade(move |socket| forward(socket, rx, query.user_id))
}

/// Relay bus events as JSON text frames until either side goes away
async fn forward(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<KarmaEvent>,
    user_id: Option<Uuid>,
) {
    debug!("Event stream opened (user filter: {:?})", user_id);
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    if user_id.is_some_and(|id| id != event.user_id()) {
                        continue;
                    }
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Could not encode {}: {}", event.name(), e);
                            continue;
                        }
                    };
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event stream lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("Event stream closed");
}
