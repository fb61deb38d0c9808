//! Room router: join, leave, and fan-out for board rooms.
//!
//! A room is keyed by board id. Joining does not consult the store; the
//! message pipeline checks board existence when something is written.

use std::sync::Arc;

use protocol::{ErrorCode, ServerEvent};
use tracing::info;

use super::registry::{ConnectionId, RoomId};
use super::validate::{ValidationError, parse_id};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ErrorCode for RoomError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.error_code(),
        }
    }
}

/// Subscribe a connection to a board's room. Idempotent.
///
/// # Errors
///
/// Returns [`RoomError::Validation`] if `raw_board_id` is not a UUID.
pub async fn join(state: &AppState, connection_id: ConnectionId, raw_board_id: &str) -> Result<RoomId, RoomError> {
    let board_id = parse_id(raw_board_id, "boardId")?;
    let mut registry = state.registry.write().await;
    if registry.join(connection_id, board_id) {
        let members = registry.members(board_id).len();
        drop(registry);
        info!(%connection_id, %board_id, members, "room: joined");
    }
    Ok(board_id)
}

/// Unsubscribe a connection from a board's room. Idempotent.
///
/// Typing state the connection held in that room is cleared and the
/// remaining members are told the user stopped typing.
///
/// # Errors
///
/// Returns [`RoomError::Validation`] if `raw_board_id` is not a UUID.
pub async fn leave(state: &AppState, connection_id: ConnectionId, raw_board_id: &str) -> Result<RoomId, RoomError> {
    let board_id = parse_id(raw_board_id, "boardId")?;
    let left = state.registry.write().await.leave(connection_id, board_id);
    super::typing::clear_connection(state, connection_id, Some(board_id)).await;
    if left {
        info!(%connection_id, %board_id, "room: left");
    }
    Ok(board_id)
}

/// Deliver `event` to every member of the room except `exclude`.
///
/// The fan-out holds the registry write lock, so concurrent broadcasts are
/// serialized and all members see them in one order.
pub async fn broadcast(state: &AppState, room_id: RoomId, event: ServerEvent, exclude: Option<ConnectionId>) -> usize {
    let event = Arc::new(event);
    state.registry.write().await.broadcast(room_id, &event, exclude)
}

/// Deliver `event` to a single connection.
pub async fn send_to(state: &AppState, connection_id: ConnectionId, event: ServerEvent) -> bool {
    state.registry.write().await.send_to(connection_id, Arc::new(event))
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
