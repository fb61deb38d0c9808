//! Remote typing indicators with one expiry timer per user.
//!
//! DESIGN
//! ======
//! Each user has at most one live timer. A new `typing:true` aborts the
//! previous timer and starts a fresh one under a new generation number
//! (cancel-and-replace). When a timer fires it reports `(user, generation)`
//! back to the owner, and the entry is only removed if the generation still
//! matches, so a timer that lost a race with a refresh is ignored.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Timer notification delivered to the session owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypingExpired {
    pub user_id: Uuid,
    pub generation: u64,
}

/// A user currently shown as typing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypingUser {
    pub user_id: Uuid,
    pub username: String,
}

struct Indicator {
    username: String,
    generation: u64,
    timer: JoinHandle<()>,
}

pub struct TypingIndicators {
    entries: HashMap<Uuid, Indicator>,
    expiry: Duration,
    expired_tx: mpsc::UnboundedSender<TypingExpired>,
    next_generation: u64,
}

impl TypingIndicators {
    #[must_use]
    pub fn new(expiry: Duration, expired_tx: mpsc::UnboundedSender<TypingExpired>) -> Self {
        Self { entries: HashMap::new(), expiry, expired_tx, next_generation: 0 }
    }

    /// Show `user_id` as typing and (re)start its expiry timer.
    pub fn start(&mut self, user_id: Uuid, username: String) {
        self.next_generation += 1;
        let generation = self.next_generation;

        let tx = self.expired_tx.clone();
        let expiry = self.expiry;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(expiry).await;
            let _ = tx.send(TypingExpired { user_id, generation });
        });

        if let Some(previous) = self.entries.insert(user_id, Indicator { username, generation, timer }) {
            previous.timer.abort();
        }
    }

    /// Remove `user_id` and cancel its timer. Returns whether it was shown.
    pub fn stop(&mut self, user_id: Uuid) -> bool {
        match self.entries.remove(&user_id) {
            Some(indicator) => {
                indicator.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Apply a timer notification. Stale generations are ignored.
    pub fn expire(&mut self, expired: TypingExpired) -> bool {
        let current = self.entries.get(&expired.user_id).map(|i| i.generation);
        if current != Some(expired.generation) {
            return false;
        }
        self.entries.remove(&expired.user_id);
        true
    }

    /// Remove every indicator and cancel every timer.
    pub fn clear(&mut self) {
        for (_, indicator) in self.entries.drain() {
            indicator.timer.abort();
        }
    }

    #[must_use]
    pub fn contains(&self, user_id: Uuid) -> bool {
        self.entries.contains_key(&user_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Users shown as typing, ordered by name.
    #[must_use]
    pub fn users(&self) -> Vec<TypingUser> {
        let mut users: Vec<TypingUser> = self
            .entries
            .iter()
            .map(|(user_id, indicator)| TypingUser { user_id: *user_id, username: indicator.username.clone() })
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username).then(a.user_id.cmp(&b.user_id)));
        users
    }
}

impl Drop for TypingIndicators {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
#[path = "typing_test.rs"]
mod tests;
