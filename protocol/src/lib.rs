//! Shared wire model for the discussion-board realtime channel.
//!
//! This crate owns the representation used by both `server` and `client`:
//! the `{event, data}` envelope, the typed client/server events carried in
//! it, the persisted message and board shapes, and the inline data-URI
//! attachment codec.
//!
//! DESIGN
//! ======
//! - Every websocket text frame is one JSON envelope. Event names are
//!   kebab-case, payload keys are camelCase.
//! - Identifiers arrive from clients as plain strings and are parsed by the
//!   server, so a malformed id is a validation failure rather than a decode
//!   failure of the whole frame.

pub mod data_uri;
pub mod event;
pub mod model;

pub use data_uri::{DataUri, DataUriError};
pub use event::{ChatSubmission, ClientEvent, ErrorNotice, ServerEvent, TypingNotice, TypingSignal};
pub use model::{Author, Board, BoardCreator, BoardDetail, BoardUpdate, ChatMessage, NewBoard, ProjectSummary};

/// Error returned when a text frame cannot be turned into an event.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The frame is not valid JSON or does not match any known event.
    #[error("invalid frame: {0}")]
    Json(#[from] serde_json::Error),
}

/// Grepable error code and retryable flag for structured `error` events.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
