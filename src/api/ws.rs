//! WebSocket pushing session state and controller events to the browser.

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::AppState;
use crate::session::{ControllerEvent, SessionController, SessionSnapshot};

/// Session state frame, sent on connect and after every change. Controller
/// events are forwarded as-is; they carry their own `type` tag.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    SessionSync { session: SessionSnapshot },
}

/// Messages accepted from the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// The router moved to a new page.
    Location { path: String },
}

pub fn ws_routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket client connecting");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, msg: &T) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize WS message");
            true
        }
    }
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    info!("WebSocket client connected");
    let controller = &state.controller;

    // Subscribe before the initial sync so nothing falls in between
    let mut snapshots = controller.watch();
    let mut events = controller.subscribe_events();

    let initial = snapshots.borrow_and_update().clone();
    if !send_json(&mut socket, &WsMessage::SessionSync { session: initial }).await {
        warn!("Failed to send initial sync, client disconnected");
        return;
    }

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    debug!("Session controller stopped");
                    break;
                }
                let session = snapshots.borrow_and_update().clone();
                if !send_json(&mut socket, &WsMessage::SessionSync { session }).await {
                    debug!("Client disconnected during send");
                    break;
                }
            }

            result = events.recv() => {
                match result {
                    Ok(event) => {
                        if !send_json(&mut socket, &event).await {
                            debug!("Client disconnected during send");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "WS client lagged behind controller events");
                        let session = controller.snapshot();
                        if !send_json(&mut socket, &WsMessage::SessionSync { session }).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Controller event channel closed");
                        break;
                    }
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_message(&text, controller).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket connection closed");
}

async fn handle_client_message(text: &str, controller: &SessionController) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Location { path }) => {
            if let Err(e) = controller.set_location(path).await {
                warn!(error = %e, "Could not forward router location");
            }
        }
        Err(e) => {
            debug!(error = %e, text = text, "Unrecognized WS message from client");
        }
    }
}
