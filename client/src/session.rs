//! Session state machine for one user on at most one board.
//!
//! DESIGN
//! ======
//! `Session` holds no sockets and performs no I/O. Every input (a user
//! command, a transport event, a history response, a timer) mutates state and
//! returns the [`Effect`]s the owner must carry out, in order. That keeps the
//! join/history/reconnect rules testable without a server.
//!
//! LIFECYCLE
//! =========
//! `Idle -> Joining -> Active -> Leaving -> Idle`. A session is `Active` once
//! `join-board` went out on the current connection and history resolved.
//! Live messages that arrive before history are queued and merged with it.

use protocol::{ChatMessage, ChatSubmission, ClientEvent, ServerEvent, TypingSignal};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ClientError;
use crate::messages::MessageLog;
use crate::typing::{TypingExpired, TypingIndicators, TypingUser};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Joining,
    Active,
    Leaving,
}

/// The local user, as sent in `chat-message` and `typing`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionUser {
    pub id: Uuid,
    pub username: String,
}

/// A file to send inline with the next message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingAttachment {
    pub file_name: String,
    pub data_uri: String,
}

impl OutgoingAttachment {
    /// Encode raw bytes as a base64 `data:` URI.
    #[must_use]
    pub fn from_bytes(file_name: impl Into<String>, media_type: &str, bytes: &[u8]) -> Self {
        Self { file_name: file_name.into(), data_uri: protocol::data_uri::encode(media_type, bytes) }
    }
}

/// Work the owner must perform after an input.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Make sure the transport is connecting or connected.
    Connect,
    Send(ClientEvent),
    /// Fetch board history and report it back with the same `request`.
    FetchHistory { board_id: Uuid, request: u64 },
}

/// Read-only view published after every input.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub board_id: Option<Uuid>,
    pub connected: bool,
    pub messages: Vec<ChatMessage>,
    pub typing: Vec<TypingUser>,
    pub input: String,
    pub last_error: Option<String>,
}

pub struct Session {
    user: SessionUser,
    phase: Phase,
    board_id: Option<Uuid>,
    connected: bool,
    /// `join-board` went out on the current connection.
    joined: bool,
    history_pending: Option<u64>,
    history_loaded: bool,
    next_request: u64,
    messages: MessageLog,
    queued: Vec<ChatMessage>,
    typing: TypingIndicators,
    input: String,
    last_error: Option<String>,
}

impl Session {
    #[must_use]
    pub fn new(user: SessionUser, typing: TypingIndicators) -> Self {
        Self {
            user,
            phase: Phase::Idle,
            board_id: None,
            connected: false,
            joined: false,
            history_pending: None,
            history_loaded: false,
            next_request: 0,
            messages: MessageLog::new(),
            queued: Vec::new(),
            typing,
            input: String::new(),
            last_error: None,
        }
    }

    /// Convenience constructor that builds the typing table from its parts.
    #[must_use]
    pub fn with_typing_expiry(
        user: SessionUser,
        expiry: std::time::Duration,
        expired_tx: mpsc::UnboundedSender<TypingExpired>,
    ) -> Self {
        Self::new(user, TypingIndicators::new(expiry, expired_tx))
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn board_id(&self) -> Option<Uuid> {
        self.board_id
    }

    // =========================================================================
    // USER COMMANDS
    // =========================================================================

    /// Switch to `board_id`, leaving the current board first.
    pub fn select_board(&mut self, board_id: Uuid) -> Vec<Effect> {
        if self.board_id == Some(board_id) && matches!(self.phase, Phase::Joining | Phase::Active) {
            return Vec::new();
        }

        let mut effects = self.leave_current();
        self.board_id = Some(board_id);
        self.phase = Phase::Joining;

        effects.push(Effect::Connect);
        if self.connected {
            effects.push(self.join_effect(board_id));
        }
        effects.push(self.history_effect(board_id));
        effects
    }

    /// Start leaving the current board. Call [`Session::complete_leave`]
    /// once the returned effects have been carried out.
    pub fn deselect(&mut self) -> Vec<Effect> {
        if self.board_id.is_none() {
            return Vec::new();
        }
        let effects = self.leave_current();
        self.phase = Phase::Leaving;
        effects
    }

    pub fn complete_leave(&mut self) {
        if self.phase == Phase::Leaving {
            self.phase = Phase::Idle;
        }
    }

    /// Record the compose box contents and announce typing state.
    pub fn compose(&mut self, input: String) -> Vec<Effect> {
        self.input = input;
        let is_typing = !self.input.is_empty();
        match self.board_id {
            Some(board_id) if self.connected => vec![self.typing_effect(board_id, is_typing)],
            _ => Vec::new(),
        }
    }

    /// Validate the compose box plus `attachment` and produce the send.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] with no board selected or nothing
    /// to send, and [`ClientError::Closed`] while disconnected.
    pub fn submit(&mut self, attachment: Option<OutgoingAttachment>) -> Result<Vec<Effect>, ClientError> {
        let board_id = self.board_id.ok_or(ClientError::Validation("no board selected"))?;
        let content = self.input.trim();
        if content.is_empty() && attachment.is_none() {
            return Err(ClientError::Validation("message is empty"));
        }
        if !self.connected {
            return Err(ClientError::Closed);
        }

        let (file_name, file_data) = match attachment {
            Some(a) => (Some(a.file_name), Some(a.data_uri)),
            None => (None, None),
        };
        let submission = ChatSubmission {
            board_id: board_id.to_string(),
            user_id: self.user.id.to_string(),
            content: (!content.is_empty()).then(|| content.to_owned()),
            file_name,
            file_data,
        };

        self.input.clear();
        Ok(vec![Effect::Send(ClientEvent::ChatMessage(submission)), self.typing_effect(board_id, false)])
    }

    pub fn record_error(&mut self, message: String) {
        self.last_error = Some(message);
    }

    // =========================================================================
    // TRANSPORT / HISTORY / TIMERS
    // =========================================================================

    /// Every new connection re-joins the current board and re-fetches
    /// history so the outage gap is filled.
    pub fn on_connected(&mut self) -> Vec<Effect> {
        self.connected = true;
        self.joined = false;
        self.last_error = None;

        let Some(board_id) = self.board_id.filter(|_| matches!(self.phase, Phase::Joining | Phase::Active)) else {
            return Vec::new();
        };

        let mut effects = vec![self.join_effect(board_id)];
        if self.history_pending.is_none() {
            effects.push(self.history_effect(board_id));
        }
        self.maybe_activate();
        effects
    }

    /// Remote typing state is stale once the room link is gone.
    pub fn on_disconnected(&mut self) {
        self.connected = false;
        self.joined = false;
        self.typing.clear();
    }

    pub fn on_gave_up(&mut self, reason: &str) {
        self.on_disconnected();
        self.last_error = Some(format!("connection lost: {reason}"));
    }

    /// Apply a history response. Responses for an older request or another
    /// board are ignored. A failed fetch still activates the session with
    /// whatever arrived live.
    pub fn on_history(&mut self, board_id: Uuid, request: u64, result: Result<Vec<ChatMessage>, String>) {
        if self.board_id != Some(board_id) || self.history_pending != Some(request) {
            debug!(%board_id, request, "ignoring stale history response");
            return;
        }
        self.history_pending = None;

        match result {
            Ok(history) => {
                let added = self.messages.merge(history);
                debug!(%board_id, added, "history merged");
            }
            Err(error) => {
                warn!(%board_id, %error, "history fetch failed");
                self.last_error = Some(format!("failed to load history: {error}"));
            }
        }

        let queued = std::mem::take(&mut self.queued);
        self.messages.merge(queued);
        self.history_loaded = true;
        self.maybe_activate();
    }

    pub fn on_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::ChatMessage(message) => {
                if self.board_id != Some(message.board_id) {
                    debug!(board_id = %message.board_id, "ignoring message for another board");
                    return;
                }
                self.typing.stop(message.user_id);
                if self.history_loaded {
                    self.messages.insert(message);
                } else {
                    self.queued.push(message);
                }
            }
            ServerEvent::Typing(notice) => {
                if notice.user_id == self.user.id || self.board_id.is_none() {
                    return;
                }
                if notice.is_typing {
                    self.typing.start(notice.user_id, notice.username);
                } else {
                    self.typing.stop(notice.user_id);
                }
            }
            ServerEvent::Error(notice) => {
                warn!(code = notice.code.as_deref().unwrap_or("-"), retryable = notice.retryable, "server error: {}", notice.message);
                self.last_error = Some(notice.message);
            }
        }
    }

    pub fn on_typing_expired(&mut self, expired: TypingExpired) -> bool {
        self.typing.expire(expired)
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            board_id: self.board_id,
            connected: self.connected,
            messages: self.messages.as_slice().to_vec(),
            typing: self.typing.users(),
            input: self.input.clone(),
            last_error: self.last_error.clone(),
        }
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn leave_current(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(board_id) = self.board_id.take() {
            if self.connected && self.joined {
                if !self.input.is_empty() {
                    effects.push(self.typing_effect(board_id, false));
                }
                effects.push(Effect::Send(ClientEvent::LeaveBoard(board_id.to_string())));
            }
        }
        self.joined = false;
        self.history_pending = None;
        self.history_loaded = false;
        self.messages.clear();
        self.queued.clear();
        self.typing.clear();
        self.input.clear();
        effects
    }

    fn join_effect(&mut self, board_id: Uuid) -> Effect {
        self.joined = true;
        Effect::Send(ClientEvent::JoinBoard(board_id.to_string()))
    }

    fn history_effect(&mut self, board_id: Uuid) -> Effect {
        self.next_request += 1;
        self.history_pending = Some(self.next_request);
        Effect::FetchHistory { board_id, request: self.next_request }
    }

    fn typing_effect(&self, board_id: Uuid, is_typing: bool) -> Effect {
        Effect::Send(ClientEvent::Typing(TypingSignal {
            board_id: board_id.to_string(),
            user_id: self.user.id.to_string(),
            username: self.user.username.clone(),
            is_typing,
        }))
    }

    fn maybe_activate(&mut self) {
        if self.phase == Phase::Joining && self.joined && self.history_loaded {
            self.phase = Phase::Active;
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
