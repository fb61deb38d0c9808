//! Client and server events carried in the `{event, data}` envelope.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ChatMessage;
use crate::{CodecError, ErrorCode};

// =============================================================================
// CLIENT → SERVER
// =============================================================================

/// Events a client sends to the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Subscribe this connection to a board's room.
    JoinBoard(String),
    /// Unsubscribe this connection from a board's room.
    LeaveBoard(String),
    /// Submit a chat message, optionally with an inline attachment.
    ChatMessage(ChatSubmission),
    /// Started/stopped typing on a board.
    Typing(TypingSignal),
}

/// Payload of an inbound `chat-message`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSubmission {
    pub board_id: String,
    pub user_id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Attachment as a `data:` URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<String>,
}

/// Payload of an inbound `typing`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingSignal {
    pub board_id: String,
    pub user_id: String,
    pub username: String,
    pub is_typing: bool,
}

impl ClientEvent {
    /// Serialize into a websocket text frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] if serialization fails.
    pub fn to_text(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a websocket text frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] for malformed JSON or unknown events.
    pub fn from_text(text: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Event name as it appears on the wire.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinBoard(_) => "join-board",
            Self::LeaveBoard(_) => "leave-board",
            Self::ChatMessage(_) => "chat-message",
            Self::Typing(_) => "typing",
        }
    }
}

// =============================================================================
// SERVER → CLIENT
// =============================================================================

/// Events the server pushes to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// A persisted message, broadcast to the whole room including its author.
    ChatMessage(ChatMessage),
    /// Someone else in the room started or stopped typing.
    Typing(TypingNotice),
    /// Failure scoped to the connection that caused it.
    Error(ErrorNotice),
}

/// Payload of an outbound `typing`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    pub user_id: Uuid,
    pub username: String,
    pub is_typing: bool,
}

/// Payload of an outbound `error`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorNotice {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub retryable: bool,
}

impl ErrorNotice {
    /// Plain error without a code.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), code: None, retryable: false }
    }

    /// Structured error from a typed error.
    #[must_use]
    pub fn from_error(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self { message: err.to_string(), code: Some(err.error_code().to_owned()), retryable: err.retryable() }
    }
}

impl ServerEvent {
    /// Serialize into a websocket text frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] if serialization fails.
    pub fn to_text(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a websocket text frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] for malformed JSON or unknown events.
    pub fn from_text(text: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(text)?)
    }

    #[must_use]
    pub fn error(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self::Error(ErrorNotice::from_error(err))
    }

    /// Event name as it appears on the wire.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChatMessage(_) => "chat-message",
            Self::Typing(_) => "typing",
            Self::Error(_) => "error",
        }
    }
}

#[cfg(test)]
#[path = "event_test.rs"]
mod tests;
