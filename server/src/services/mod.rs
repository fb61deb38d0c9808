//! Realtime services used by the websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own membership, fan-out, and validation so route
//! handlers can stay focused on protocol translation. They reach storage
//! only through the `ChatStore` held in `AppState`.

pub mod attachment;
pub mod message;
pub mod registry;
pub mod room;
pub mod typing;
pub mod validate;
