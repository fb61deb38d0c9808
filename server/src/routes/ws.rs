//! WebSocket handler: event relay between one client and the rooms it joined.
//!
//! DESIGN
//! ======
//! On upgrade the connection is registered with a bounded outbound channel
//! and enters a `select!` loop:
//! - Incoming client frames → decode `{event, data}` → dispatch
//! - Events queued by room broadcasts → forward to the socket
//!
//! Dispatch never writes to the socket directly. Room-wide events go out
//! through the registry, and so does the `error` reply returned from
//! `process_inbound_text`, which keeps replies ordered with room events.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → register connection (no rooms)
//! 2. `join-board` / `leave-board` manage membership
//! 3. `chat-message` / `typing` fan out to the board's room
//! 4. Close → unregister, which also clears typing state

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use protocol::{ClientEvent, CodecError, ErrorCode, ServerEvent};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::services::message::{self, MessageError};
use crate::services::registry::{self, ConnectionId, Outbound};
use crate::services::{room, typing};
use crate::state::AppState;

/// A text frame that could not be decoded into a client event.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct InvalidFrame(#[from] CodecError);

impl ErrorCode for InvalidFrame {
    fn error_code(&self) -> &'static str {
        "E_INVALID_FRAME"
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.max_message_size(state.config.max_frame_bytes())
        .on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let (client_tx, mut client_rx) = mpsc::channel::<Outbound>(state.config.client_channel_capacity);
    let connection_id = registry::register(&state, client_tx).await;
    info!(%connection_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(e) => {
                        debug!(%connection_id, error = %e, "ws: receive failed");
                        break;
                    }
                };
                match msg {
                    Message::Text(text) => {
                        if let Some(reply) = process_inbound_text(&state, connection_id, &text).await {
                            room::send_to(&state, connection_id, reply).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = client_rx.recv() => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    registry::unregister(&state, connection_id).await;
    info!(%connection_id, "ws: client disconnected");
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Decode and handle one inbound text frame. Returns an event for the
/// sender only, which is always an `error`.
async fn process_inbound_text(state: &AppState, connection_id: ConnectionId, text: &str) -> Option<ServerEvent> {
    let event = match ClientEvent::from_text(text) {
        Ok(event) => event,
        Err(e) => {
            let err = InvalidFrame::from(e);
            warn!(%connection_id, error = %err, "ws: invalid inbound frame");
            return Some(ServerEvent::error(&err));
        }
    };

    let name = event.name();
    debug!(%connection_id, event = name, "ws: recv event");

    match event {
        ClientEvent::JoinBoard(board_id) => room::join(state, connection_id, &board_id)
            .await
            .err()
            .map(|e| reject(connection_id, name, &e)),
        ClientEvent::LeaveBoard(board_id) => room::leave(state, connection_id, &board_id)
            .await
            .err()
            .map(|e| reject(connection_id, name, &e)),
        ClientEvent::ChatMessage(submission) => match message::submit(state, submission).await {
            Ok(_) => None,
            Err(e @ MessageError::Persistence(_)) => {
                error!(%connection_id, error = %e, source = ?std::error::Error::source(&e), "ws: message persistence failed");
                Some(ServerEvent::error(&e))
            }
            Err(e) => Some(reject(connection_id, name, &e)),
        },
        ClientEvent::Typing(signal) => typing::signal(state, connection_id, signal)
            .await
            .err()
            .map(|e| reject(connection_id, name, &e)),
    }
}

fn reject(connection_id: ConnectionId, event: &'static str, err: &impl ErrorCode) -> ServerEvent {
    warn!(%connection_id, event, code = err.error_code(), error = %err, "ws: event rejected");
    ServerEvent::error(err)
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), ()> {
    let text = match event.to_text() {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, event = event.name(), "ws: failed to serialize event");
            return Err(());
        }
    };
    socket.send(Message::Text(text.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
