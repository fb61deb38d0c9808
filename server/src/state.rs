//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor and
//! cloned into background tasks. It holds the persistence collaborator, the
//! connection/room registry, the typing table, and the realtime tuning
//! knobs. Everything behind it is process-lifetime and starts empty.

use std::sync::{Arc, Mutex};

use tokio::sync::RwLock;

use crate::config::RealtimeConfig;
use crate::services::registry::Registry;
use crate::services::typing::TypingTable;
use crate::store::ChatStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChatStore>,
    /// Connections and room membership. Fan-out takes the write lock.
    pub registry: Arc<RwLock<Registry>>,
    /// Never held across an await.
    pub typing: Arc<Mutex<TypingTable>>,
    pub config: RealtimeConfig,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn ChatStore>, config: RealtimeConfig) -> Self {
        Self {
            store,
            registry: Arc::new(RwLock::new(Registry::new())),
            typing: Arc::new(Mutex::new(TypingTable::new())),
            config,
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
