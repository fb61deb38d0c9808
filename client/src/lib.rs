//! Client session controller for the discussion-board realtime channel.
//!
//! The crate is split the way the data flows:
//! - `transport` owns one websocket link with bounded reconnection
//! - `api` fetches boards and history over REST
//! - `session` is the state machine that decides what to send and what to show
//! - `controller` drives the session from commands, transport events, timers,
//!   and history responses, and publishes snapshots through a `watch` channel
//!
//! Consumers hold a [`SessionHandle`]; there is no process-wide socket.

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod messages;
pub mod session;
pub mod transport;
pub mod typing;

pub use api::ApiClient;
pub use config::ClientConfig;
pub use controller::{SessionHandle, spawn_session};
pub use error::ClientError;
pub use session::{OutgoingAttachment, Phase, SessionSnapshot, SessionUser};
pub use typing::TypingUser;

#[cfg(test)]
mod test_support;
