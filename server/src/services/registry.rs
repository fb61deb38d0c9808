//! Connection registry and room membership table.
//!
//! DESIGN
//! ======
//! One `Registry` value owns both directions of the membership relation:
//! connection → joined rooms, and room → member connections. Both maps are
//! mutated together under the `AppState` write lock so they never disagree.
//! A room exists only while it has members.
//!
//! Delivery is non-blocking. `broadcast` walks the member set once and
//! `try_send`s into each member's bounded FIFO channel. Callers fan out
//! under the write lock, so two broadcasts never interleave and every member
//! observes events of one room in the same order. A full channel drops that
//! one delivery and never stalls the room.
//!
//! SYSTEM CONTEXT
//! ==============
//! The websocket handler registers on upgrade and unregisters on close.
//! Unregistering also clears any typing state the connection owned and
//! tells the rooms it left that the user stopped typing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use protocol::ServerEvent;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::AppState;

// =============================================================================
// TYPES
// =============================================================================

pub type ConnectionId = Uuid;
pub type RoomId = Uuid;

/// Events are shared between every member of a broadcast.
pub type Outbound = Arc<ServerEvent>;

struct Connection {
    tx: mpsc::Sender<Outbound>,
    rooms: HashSet<RoomId>,
}

#[derive(Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
}

// =============================================================================
// REGISTRY
// =============================================================================

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new connection and return its id.
    pub fn register(&mut self, tx: mpsc::Sender<Outbound>) -> ConnectionId {
        let id = Uuid::new_v4();
        self.connections.insert(id, Connection { tx, rooms: HashSet::new() });
        id
    }

    /// Drop a connection and remove it from every room it joined.
    /// Returns the rooms it was in.
    pub fn unregister(&mut self, connection_id: ConnectionId) -> Vec<RoomId> {
        let Some(connection) = self.connections.remove(&connection_id) else {
            return Vec::new();
        };
        let rooms: Vec<RoomId> = connection.rooms.into_iter().collect();
        for room_id in &rooms {
            self.remove_member(*room_id, connection_id);
        }
        rooms
    }

    #[must_use]
    pub fn rooms_of(&self, connection_id: ConnectionId) -> HashSet<RoomId> {
        self.connections
            .get(&connection_id)
            .map(|c| c.rooms.clone())
            .unwrap_or_default()
    }

    /// Add a connection to a room. Returns `false` if it was already a
    /// member or the connection is unknown.
    pub fn join(&mut self, connection_id: ConnectionId, room_id: RoomId) -> bool {
        let Some(connection) = self.connections.get_mut(&connection_id) else {
            return false;
        };
        if !connection.rooms.insert(room_id) {
            return false;
        }
        self.rooms.entry(room_id).or_default().insert(connection_id);
        true
    }

    /// Remove a connection from a room. Returns `false` if it was not a member.
    pub fn leave(&mut self, connection_id: ConnectionId, room_id: RoomId) -> bool {
        let Some(connection) = self.connections.get_mut(&connection_id) else {
            return false;
        };
        if !connection.rooms.remove(&room_id) {
            return false;
        }
        self.remove_member(room_id, connection_id);
        true
    }

    #[must_use]
    pub fn members(&self, room_id: RoomId) -> HashSet<ConnectionId> {
        self.rooms.get(&room_id).cloned().unwrap_or_default()
    }

    #[cfg(test)]
    #[must_use]
    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.connections.contains_key(&connection_id)
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Deliver `event` to every member of `room_id` except `exclude`.
    /// Returns how many members accepted it.
    pub fn broadcast(&self, room_id: RoomId, event: &Outbound, exclude: Option<ConnectionId>) -> usize {
        let Some(members) = self.rooms.get(&room_id) else {
            return 0;
        };

        let mut delivered = 0;
        for member in members {
            if exclude == Some(*member) {
                continue;
            }
            if self.deliver(*member, Arc::clone(event)) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Deliver `event` to one connection.
    pub fn send_to(&self, connection_id: ConnectionId, event: Outbound) -> bool {
        self.deliver(connection_id, event)
    }

    fn deliver(&self, connection_id: ConnectionId, event: Outbound) -> bool {
        let Some(connection) = self.connections.get(&connection_id) else {
            return false;
        };
        match connection.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(%connection_id, event = event.name(), "registry: outbound queue full, dropping event");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(%connection_id, "registry: outbound queue closed");
                false
            }
        }
    }

    fn remove_member(&mut self, room_id: RoomId, connection_id: ConnectionId) {
        if let Some(members) = self.rooms.get_mut(&room_id) {
            members.remove(&connection_id);
            if members.is_empty() {
                self.rooms.remove(&room_id);
            }
        }
    }
}

// =============================================================================
// LIFECYCLE
// =============================================================================

/// Register a connection's outbound channel.
pub async fn register(state: &AppState, tx: mpsc::Sender<Outbound>) -> ConnectionId {
    let mut registry = state.registry.write().await;
    let connection_id = registry.register(tx);
    let connections = registry.connection_count();
    drop(registry);
    info!(%connection_id, connections, "registry: connection registered");
    connection_id
}

/// Remove a connection from every room and clear the typing state it owned.
pub async fn unregister(state: &AppState, connection_id: ConnectionId) {
    let (rooms, live_rooms) = {
        let mut registry = state.registry.write().await;
        let rooms = registry.unregister(connection_id);
        (rooms, registry.room_count())
    };
    let cleared = super::typing::clear_connection(state, connection_id, None).await;
    info!(
        %connection_id,
        rooms = rooms.len(),
        live_rooms,
        typing_cleared = cleared,
        "registry: connection unregistered"
    );
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
