//! Async owner of one [`Session`] and its transport.
//!
//! ARCHITECTURE
//! ============
//! `spawn_session` starts a single task that owns the session, the
//! transport, and the REST client. It selects over four inputs:
//! user commands from [`SessionHandle`]s, transport events, typing timer
//! expiries, and history responses from spawned fetches. After each input it
//! carries out the session's effects and publishes a fresh
//! [`SessionSnapshot`] on a `watch` channel.
//!
//! LIFECYCLE
//! =========
//! The task runs until `shutdown` is called or every handle is dropped. On
//! exit it leaves the current board and closes the socket. Transport events
//! keep being drained until the link task has finished.

use protocol::ChatMessage;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::session::{Effect, OutgoingAttachment, Session, SessionSnapshot, SessionUser};
use crate::transport::{Transport, TransportEvent};

const COMMAND_CAPACITY: usize = 64;
const TRANSPORT_EVENT_CAPACITY: usize = 256;

enum Command {
    SelectBoard(Uuid),
    Deselect,
    Compose(String),
    Submit { attachment: Option<OutgoingAttachment>, reply: oneshot::Sender<Result<(), ClientError>> },
    Shutdown,
}

struct HistoryResponse {
    board_id: Uuid,
    request: u64,
    result: Result<Vec<ChatMessage>, String>,
}

/// Cloneable handle to a running session task.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] if the session task has exited.
    pub async fn select_board(&self, board_id: Uuid) -> Result<(), ClientError> {
        self.command(Command::SelectBoard(board_id)).await
    }

    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] if the session task has exited.
    pub async fn deselect(&self) -> Result<(), ClientError> {
        self.command(Command::Deselect).await
    }

    /// Replace the compose box contents.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] if the session task has exited.
    pub async fn compose(&self, input: impl Into<String>) -> Result<(), ClientError> {
        self.command(Command::Compose(input.into())).await
    }

    /// Send the compose box contents, plus an optional attachment.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for an empty message or no board,
    /// and [`ClientError::Closed`] while disconnected.
    pub async fn submit(&self, attachment: Option<OutgoingAttachment>) -> Result<(), ClientError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Submit { attachment, reply }).await?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Ask the session task to leave and close. Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until a published snapshot satisfies `pred`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] if the session task exits first.
    pub async fn wait_for(&self, pred: impl FnMut(&SessionSnapshot) -> bool) -> Result<SessionSnapshot, ClientError> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx.wait_for(pred).await.map_err(|_| ClientError::Closed)?;
        Ok(snapshot.clone())
    }

    async fn command(&self, command: Command) -> Result<(), ClientError> {
        self.commands.send(command).await.map_err(|_| ClientError::Closed)
    }
}

/// Start a session task for `user` against `config.base_url`.
#[must_use]
pub fn spawn_session(config: ClientConfig, user: SessionUser) -> (SessionHandle, JoinHandle<()>) {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (snapshots_tx, snapshots_rx) = watch::channel(SessionSnapshot::default());

    let task = tokio::spawn(async move {
        SessionController::new(config, user, snapshots_tx).run(commands_rx).await;
    });

    (SessionHandle { commands: commands_tx, snapshots: snapshots_rx }, task)
}

// =============================================================================
// CONTROLLER TASK
// =============================================================================

struct SessionController {
    session: Session,
    transport: Transport,
    transport_rx: mpsc::Receiver<TransportEvent>,
    expired_rx: mpsc::UnboundedReceiver<crate::typing::TypingExpired>,
    history_tx: mpsc::UnboundedSender<HistoryResponse>,
    history_rx: mpsc::UnboundedReceiver<HistoryResponse>,
    api: ApiClient,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    fn new(config: ClientConfig, user: SessionUser, snapshots: watch::Sender<SessionSnapshot>) -> Self {
        let (transport_tx, transport_rx) = mpsc::channel(TRANSPORT_EVENT_CAPACITY);
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        let (history_tx, history_rx) = mpsc::unbounded_channel();

        info!(user_id = %user.id, base_url = %config.base_url, "session started");
        Self {
            session: Session::with_typing_expiry(user, config.typing_expiry, expired_tx),
            api: ApiClient::new(&config.base_url),
            transport: Transport::new(config, transport_tx),
            transport_rx,
            expired_rx,
            history_tx,
            history_rx,
            snapshots,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = self.transport_rx.recv() => self.handle_transport(event),
                Some(expired) = self.expired_rx.recv() => {
                    self.session.on_typing_expired(expired);
                }
                Some(history) = self.history_rx.recv() => {
                    self.session.on_history(history.board_id, history.request, history.result);
                }
            }
            self.publish();
        }

        let effects = self.session.deselect();
        let _ = self.apply(effects);
        self.session.complete_leave();
        self.close_transport().await;
        self.session.on_disconnected();
        self.publish();
        info!("session closed");
    }

    /// Disconnect while still draining transport events, so a link task
    /// blocked on a full event queue can reach its close handshake.
    async fn close_transport(&mut self) {
        let disconnect = self.transport.disconnect();
        tokio::pin!(disconnect);
        let mut discarded = 0_usize;
        loop {
            tokio::select! {
                () = &mut disconnect => break,
                Some(_) = self.transport_rx.recv() => discarded += 1,
            }
        }
        if discarded > 0 {
            debug!(discarded, "transport events discarded during shutdown");
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SelectBoard(board_id) => {
                let effects = self.session.select_board(board_id);
                let _ = self.apply(effects);
            }
            Command::Deselect => {
                let effects = self.session.deselect();
                let _ = self.apply(effects);
                self.session.complete_leave();
            }
            Command::Compose(input) => {
                let effects = self.session.compose(input);
                let _ = self.apply(effects);
            }
            Command::Submit { attachment, reply } => {
                let outcome = self.session.submit(attachment).and_then(|effects| self.apply(effects));
                let _ = reply.send(outcome);
            }
            Command::Shutdown => {}
        }
    }

    fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                let effects = self.session.on_connected();
                let _ = self.apply(effects);
            }
            TransportEvent::Disconnected => self.session.on_disconnected(),
            TransportEvent::GaveUp(reason) => self.session.on_gave_up(&reason),
            TransportEvent::Message(event) => self.session.on_server_event(event),
        }
    }

    /// Carry out effects in order. Every effect is attempted; the first
    /// failure is returned.
    fn apply(&mut self, effects: Vec<Effect>) -> Result<(), ClientError> {
        let mut outcome = Ok(());
        for effect in effects {
            let result = match effect {
                Effect::Connect => self.transport.connect().inspect_err(|error| {
                    self.session.record_error(error.to_string());
                }),
                Effect::Send(event) => {
                    let name = event.name();
                    self.transport.send(event).inspect_err(|error| {
                        debug!(event = name, %error, "client event not sent");
                    })
                }
                Effect::FetchHistory { board_id, request } => {
                    self.fetch_history(board_id, request);
                    Ok(())
                }
            };
            if outcome.is_ok() {
                outcome = result;
            }
        }
        outcome
    }

    fn fetch_history(&self, board_id: Uuid, request: u64) {
        let api = self.api.clone();
        let tx = self.history_tx.clone();
        tokio::spawn(async move {
            let result = api.fetch_board_posts(board_id).await.map_err(|error| error.to_string());
            let _ = tx.send(HistoryResponse { board_id, request, result });
        });
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.session.snapshot());
    }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;
