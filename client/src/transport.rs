//! One websocket link to the server with bounded reconnection.
//!
//! DESIGN
//! ======
//! `Transport` is owned by the session controller. `connect` spawns a link
//! task (idempotent while one is alive); the task dials, pumps frames in both
//! directions, and reports lifecycle changes as [`TransportEvent`]s on a
//! bounded channel. After a drop it waits `reconnect_delay` and dials again.
//! A run of failed dials longer than `reconnect_attempts` ends the task with
//! [`TransportEvent::GaveUp`].
//!
//! ERROR HANDLING
//! ==============
//! Sends while disconnected fail fast with [`ClientError::Closed`]. Frames
//! queued when the socket dies are dropped and logged; the session re-joins
//! and re-fetches history on the next `Connected` instead of replaying them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use protocol::{ClientEvent, ServerEvent};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle and inbound traffic reported by the link task.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    Message(ServerEvent),
    /// Reconnection attempts are exhausted; the link task has exited.
    /// Carries the last dial error.
    GaveUp(String),
}

struct Link {
    outbound: mpsc::UnboundedSender<ClientEvent>,
    connected: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

pub struct Transport {
    config: ClientConfig,
    events: mpsc::Sender<TransportEvent>,
    link: Option<Link>,
}

impl Transport {
    #[must_use]
    pub fn new(config: ClientConfig, events: mpsc::Sender<TransportEvent>) -> Self {
        Self { config, events, link: None }
    }

    /// Start the link task unless one is already running.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidBaseUrl`] if no websocket URL can be
    /// derived from the configured base URL.
    pub fn connect(&mut self) -> Result<(), ClientError> {
        if self.link.as_ref().is_some_and(|link| !link.task.is_finished()) {
            return Ok(());
        }

        let url = self.config.ws_url()?;
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run_link(url, self.config.clone(), self.events.clone(), outbound_rx, connected.clone()));

        self.link = Some(Link { outbound, connected, task });
        Ok(())
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(|link| link.connected.load(Ordering::SeqCst))
    }

    /// Queue one event for the live socket.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] when there is no live socket.
    pub fn send(&self, event: ClientEvent) -> Result<(), ClientError> {
        let link = self.link.as_ref().ok_or(ClientError::Closed)?;
        if !link.connected.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }
        link.outbound.send(event).map_err(|_| ClientError::Closed)
    }

    /// Close the socket with a close frame and wait for the link task.
    pub async fn disconnect(&mut self) {
        let Some(link) = self.link.take() else {
            return;
        };
        link.connected.store(false, Ordering::SeqCst);
        drop(link.outbound);
        if let Err(error) = link.task.await {
            debug!(%error, "link task ended abnormally");
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            link.task.abort();
        }
    }
}

// =============================================================================
// LINK TASK
// =============================================================================

enum LinkEnd {
    /// The owner closed the outbound channel or stopped listening.
    Owner,
    /// The socket failed or the server closed it.
    Dropped,
}

async fn run_link(
    url: String,
    config: ClientConfig,
    events: mpsc::Sender<TransportEvent>,
    mut outbound: mpsc::UnboundedReceiver<ClientEvent>,
    connected: Arc<AtomicBool>,
) {
    let mut failures: u32 = 0;

    loop {
        let dialed = tokio::select! {
            result = connect_async(url.as_str()) => result,
            () = owner_gone(&mut outbound) => return,
        };

        match dialed {
            Ok((stream, _)) => {
                failures = 0;
                connected.store(true, Ordering::SeqCst);
                info!(%url, "websocket connected");
                if events.send(TransportEvent::Connected).await.is_err() {
                    return;
                }

                let end = pump(stream, &mut outbound, &events).await;
                connected.store(false, Ordering::SeqCst);
                if matches!(end, LinkEnd::Owner) {
                    return;
                }

                let mut dropped = 0_usize;
                while outbound.try_recv().is_ok() {
                    dropped += 1;
                }
                warn!(%url, dropped, "websocket disconnected");
                if events.send(TransportEvent::Disconnected).await.is_err() {
                    return;
                }
            }
            Err(error) => {
                let error = ClientError::WsConnect(Box::new(error));
                failures += 1;
                warn!(%url, %error, failures, "websocket connect failed");
                if failures > config.reconnect_attempts {
                    warn!(%url, attempts = config.reconnect_attempts, "giving up on websocket");
                    let _ = events.send(TransportEvent::GaveUp(error.to_string())).await;
                    return;
                }
            }
        }

        tokio::select! {
            () = tokio::time::sleep(config.reconnect_delay) => {}
            () = owner_gone(&mut outbound) => return,
        }
    }
}

/// Resolves once the owner drops its sender. Events sent while no socket is
/// live are discarded.
async fn owner_gone(outbound: &mut mpsc::UnboundedReceiver<ClientEvent>) {
    while let Some(event) = outbound.recv().await {
        debug!(event = event.name(), "dropping event sent while disconnected");
    }
}

async fn pump(
    stream: WsStream,
    outbound: &mut mpsc::UnboundedReceiver<ClientEvent>,
    events: &mpsc::Sender<TransportEvent>,
) -> LinkEnd {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            next = outbound.recv() => {
                let Some(event) = next else {
                    let _ = sink.send(Message::Close(None)).await;
                    return LinkEnd::Owner;
                };
                let text = match event.to_text() {
                    Ok(text) => text,
                    Err(error) => {
                        warn!(%error, event = event.name(), "failed to encode client event");
                        continue;
                    }
                };
                if let Err(error) = sink.send(Message::Text(text.into())).await {
                    debug!(%error, "websocket write failed");
                    return LinkEnd::Dropped;
                }
            }
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => match ServerEvent::from_text(text.as_str()) {
                    Ok(event) => {
                        if events.send(TransportEvent::Message(event)).await.is_err() {
                            return LinkEnd::Owner;
                        }
                    }
                    Err(error) => warn!(%error, "ignoring unparseable server frame"),
                },
                Some(Ok(Message::Close(_))) | None => return LinkEnd::Dropped,
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    debug!(%error, "websocket read failed");
                    return LinkEnd::Dropped;
                }
            },
        }
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
