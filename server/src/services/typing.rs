//! Typing-state coordinator.
//!
//! DESIGN
//! ======
//! Entries are keyed by `(board, user)` and remember the connection that
//! signaled them. Every signal is relayed to the room excluding the
//! signaling connection. `typing:false` is relayed even when no entry
//! exists, so late or duplicate stops are harmless to receivers.
//!
//! Stale entries are swept on an interval: anything not refreshed within
//! `typing_expiry` is removed and a `typing:false` goes to the room. The
//! same cleanup runs immediately when a connection leaves a room or
//! disconnects, so a client that vanishes mid-typing never leaves a stuck
//! indicator behind.
//!
//! The table sits behind a `std::sync::Mutex` that is never held across an
//! await. Every mutation that is announced to a room happens while the
//! registry write guard is held, and the announcement goes out under that
//! same guard. A sweep's `typing:false` therefore cannot land after a newer
//! `typing:true` for the same user. Lock order is registry, then table.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use protocol::{ErrorCode, ServerEvent, TypingNotice, TypingSignal};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use super::registry::{ConnectionId, Registry, RoomId};
use super::validate::{ValidationError, parse_id};
use crate::state::AppState;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TypingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ErrorCode for TypingError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.error_code(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TypingEntry {
    pub display_name: String,
    pub last_signaled: Instant,
    pub connection_id: ConnectionId,
}

/// An entry removed from the table whose room must hear `typing:false`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClearedTyping {
    pub board_id: RoomId,
    pub user_id: Uuid,
    pub display_name: String,
    pub connection_id: ConnectionId,
}

#[derive(Default)]
pub struct TypingTable {
    entries: HashMap<(RoomId, Uuid), TypingEntry>,
}

// =============================================================================
// TABLE
// =============================================================================

impl TypingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh an entry.
    pub fn upsert(
        &mut self,
        board_id: RoomId,
        user_id: Uuid,
        display_name: String,
        connection_id: ConnectionId,
        now: Instant,
    ) {
        self.entries
            .insert((board_id, user_id), TypingEntry { display_name, last_signaled: now, connection_id });
    }

    pub fn remove(&mut self, board_id: RoomId, user_id: Uuid) -> Option<TypingEntry> {
        self.entries.remove(&(board_id, user_id))
    }

    #[cfg(test)]
    #[must_use]
    pub fn get(&self, board_id: RoomId, user_id: Uuid) -> Option<&TypingEntry> {
        self.entries.get(&(board_id, user_id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove entries last signaled at least `expiry` before `now`.
    pub fn take_expired(&mut self, now: Instant, expiry: Duration) -> Vec<ClearedTyping> {
        self.take_where(|_, entry| now.saturating_duration_since(entry.last_signaled) >= expiry)
    }

    /// Remove entries owned by a connection, optionally limited to one room.
    pub fn take_by_connection(&mut self, connection_id: ConnectionId, board_id: Option<RoomId>) -> Vec<ClearedTyping> {
        self.take_where(|room, entry| entry.connection_id == connection_id && board_id.is_none_or(|b| b == room))
    }

    fn take_where(&mut self, mut pred: impl FnMut(RoomId, &TypingEntry) -> bool) -> Vec<ClearedTyping> {
        let keys: Vec<(RoomId, Uuid)> = self
            .entries
            .iter()
            .filter(|(key, entry)| pred(key.0, *entry))
            .map(|(key, _)| *key)
            .collect();

        keys.into_iter()
            .filter_map(|(board_id, user_id)| {
                self.entries.remove(&(board_id, user_id)).map(|entry| ClearedTyping {
                    board_id,
                    user_id,
                    display_name: entry.display_name,
                    connection_id: entry.connection_id,
                })
            })
            .collect()
    }
}

// =============================================================================
// SIGNALS
// =============================================================================

/// Apply a typing signal from `connection_id` and relay it to the room.
///
/// # Errors
///
/// Returns [`TypingError::Validation`] if the board or user id is malformed.
pub async fn signal(state: &AppState, connection_id: ConnectionId, signal: TypingSignal) -> Result<usize, TypingError> {
    let board_id = parse_id(&signal.board_id, "boardId")?;
    let user_id = parse_id(&signal.user_id, "userId")?;

    let registry = state.registry.write().await;
    {
        let mut table = state.typing.lock().unwrap_or_else(PoisonError::into_inner);
        if signal.is_typing {
            table.upsert(board_id, user_id, signal.username.clone(), connection_id, Instant::now());
        } else {
            table.remove(board_id, user_id);
        }
    }

    let notice = TypingNotice { user_id, username: signal.username, is_typing: signal.is_typing };
    let delivered = registry.broadcast(board_id, &Arc::new(ServerEvent::Typing(notice)), Some(connection_id));
    drop(registry);
    debug!(%connection_id, %board_id, %user_id, is_typing = signal.is_typing, delivered, "typing: relayed");
    Ok(delivered)
}

/// Forget typing state for a user in a room without broadcasting.
/// Used when the user's chat message lands, which already ends typing.
pub fn clear_user(state: &AppState, board_id: RoomId, user_id: Uuid) {
    state
        .typing
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(board_id, user_id);
}

/// Clear entries owned by a connection and tell their rooms the user
/// stopped typing. Returns how many entries were cleared.
pub async fn clear_connection(state: &AppState, connection_id: ConnectionId, board_id: Option<RoomId>) -> usize {
    let registry = state.registry.write().await;
    let cleared = state
        .typing
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take_by_connection(connection_id, board_id);
    announce_stopped(&registry, &cleared);
    cleared.len()
}

// =============================================================================
// EXPIRY SWEEP
// =============================================================================

/// Sweep entries that have gone stale as of now.
pub async fn sweep_expired(state: &AppState) -> usize {
    sweep_expired_at(state, Instant::now()).await
}

pub async fn sweep_expired_at(state: &AppState, now: Instant) -> usize {
    if state.typing.lock().unwrap_or_else(PoisonError::into_inner).is_empty() {
        return 0;
    }

    let registry = state.registry.write().await;
    let (expired, remaining) = {
        let mut table = state.typing.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = table.take_expired(now, state.config.typing_expiry);
        (expired, table.len())
    };
    announce_stopped(&registry, &expired);
    drop(registry);

    let count = expired.len();
    if count > 0 {
        debug!(count, remaining, "typing: swept stale entries");
    }
    count
}

/// Spawn the background sweep task.
pub fn spawn_typing_sweep(state: AppState) -> JoinHandle<()> {
    let interval = state.config.typing_sweep_interval;
    info!(
        sweep_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        expiry_ms = u64::try_from(state.config.typing_expiry.as_millis()).unwrap_or(u64::MAX),
        "typing sweep configured"
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep_expired(&state).await;
        }
    })
}

/// Tell each cleared entry's room the user stopped typing. Runs under the
/// same registry guard that covered the removal.
fn announce_stopped(registry: &Registry, cleared: &[ClearedTyping]) {
    for entry in cleared {
        let notice =
            TypingNotice { user_id: entry.user_id, username: entry.display_name.clone(), is_typing: false };
        registry.broadcast(entry.board_id, &Arc::new(ServerEvent::Typing(notice)), Some(entry.connection_id));
    }
}

#[cfg(test)]
#[path = "typing_test.rs"]
mod tests;
