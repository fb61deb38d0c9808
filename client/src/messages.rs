//! Ordered, de-duplicated message cache for the selected board.

use std::collections::HashSet;

use protocol::ChatMessage;
use uuid::Uuid;

/// Messages ordered by `(created_at, id)` with at most one entry per id.
///
/// History and live events overlap around a join or a reconnect, so every
/// insert goes through the same de-duplication.
#[derive(Clone, Debug, Default)]
pub struct MessageLog {
    messages: Vec<ChatMessage>,
    ids: HashSet<Uuid>,
}

impl MessageLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one message. Returns false if its id is already present.
    pub fn insert(&mut self, message: ChatMessage) -> bool {
        if !self.ids.insert(message.id) {
            return false;
        }
        if self.messages.last().is_none_or(|last| sort_key(last) <= sort_key(&message)) {
            self.messages.push(message);
            return true;
        }
        let pos = self.messages.partition_point(|m| sort_key(m) <= sort_key(&message));
        self.messages.insert(pos, message);
        true
    }

    /// Insert a batch, returning how many were new. The batch is appended
    /// and the log re-sorted once.
    pub fn merge(&mut self, batch: impl IntoIterator<Item = ChatMessage>) -> usize {
        let before = self.messages.len();
        for message in batch {
            if self.ids.insert(message.id) {
                self.messages.push(message);
            }
        }
        let added = self.messages.len() - before;
        if added > 0 && !self.messages.is_sorted_by_key(sort_key) {
            self.messages.sort_by_key(sort_key);
        }
        added
    }

    #[must_use]
    pub fn contains(&self, id: Uuid) -> bool {
        self.ids.contains(&id)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.ids.clear();
    }

    #[must_use]
    pub fn as_slice(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

fn sort_key(message: &ChatMessage) -> (time::OffsetDateTime, Uuid) {
    (message.created_at, message.id)
}

#[cfg(test)]
#[path = "messages_test.rs"]
mod tests;
