//! Message pipeline: validate, persist, then broadcast a chat message.
//!
//! DESIGN
//! ======
//! A submission moves through fixed stages and stops at the first failure:
//! parse ids, trim content, validate the attachment, check that the board
//! and author exist, write the post, fan it out. The broadcast only runs
//! after the write succeeded, so every delivered message is durable. The
//! author's own connection receives the broadcast too; it doubles as the
//! acknowledgement.
//!
//! ERROR HANDLING
//! ==============
//! Failures are returned to the caller, which reports them to the
//! submitting connection only. Store failures are marked retryable; the
//! pipeline itself never retries.

use protocol::{ChatMessage, ChatSubmission, ErrorCode, ServerEvent};
use tracing::info;
use uuid::Uuid;

use super::attachment;
use super::room;
use super::typing;
use super::validate::{ValidationError, non_blank, parse_id};
use crate::state::AppState;
use crate::store::{NewMessage, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("board not found: {0}")]
    BoardNotFound(Uuid),
    #[error("user not found: {0}")]
    UserNotFound(Uuid),
    #[error("failed to save message")]
    Persistence(#[source] StoreError),
}

impl ErrorCode for MessageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.error_code(),
            Self::BoardNotFound(_) => "E_BOARD_NOT_FOUND",
            Self::UserNotFound(_) => "E_USER_NOT_FOUND",
            Self::Persistence(_) => "E_PERSISTENCE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

/// Turn a raw submission into a storable message. No I/O.
///
/// # Errors
///
/// Returns [`ValidationError`] for malformed ids, an empty message, or a
/// rejected attachment.
pub fn prepare(submission: ChatSubmission, max_attachment_bytes: usize) -> Result<NewMessage, ValidationError> {
    let board_id = parse_id(&submission.board_id, "boardId")?;
    let user_id = parse_id(&submission.user_id, "userId")?;
    let content = non_blank(submission.content);
    let attachment = attachment::validate(submission.file_name, submission.file_data, max_attachment_bytes)?;

    if content.is_none() && attachment.is_none() {
        return Err(ValidationError::EmptyMessage);
    }

    let (file_name, file_data) = attachment.map_or((None, None), |a| (Some(a.file_name), Some(a.data_uri)));
    Ok(NewMessage { board_id, user_id, content, file_name, file_data })
}

/// Validate, persist, and broadcast one chat message to its board's room.
///
/// # Errors
///
/// Returns a [`MessageError`]; nothing is persisted or broadcast on error.
pub async fn submit(state: &AppState, submission: ChatSubmission) -> Result<ChatMessage, MessageError> {
    let new_message = prepare(submission, state.config.max_attachment_bytes)?;
    let board_id = new_message.board_id;
    let user_id = new_message.user_id;

    if !state.store.board_exists(board_id).await.map_err(MessageError::Persistence)? {
        return Err(MessageError::BoardNotFound(board_id));
    }
    if !state.store.user_exists(user_id).await.map_err(MessageError::Persistence)? {
        return Err(MessageError::UserNotFound(user_id));
    }

    let message = state
        .store
        .create_message(new_message)
        .await
        .map_err(MessageError::Persistence)?;

    typing::clear_user(state, board_id, user_id);
    let delivered = room::broadcast(state, board_id, ServerEvent::ChatMessage(message.clone()), None).await;
    info!(
        message_id = %message.id,
        %board_id,
        %user_id,
        attachment = message.has_attachment(),
        delivered,
        "message: broadcast"
    );
    Ok(message)
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
