//! Scripted axum server used by the client tests.
//!
//! It speaks the same REST and websocket surface as the real server but keeps
//! everything in memory, records every client event it receives, and lets a
//! test push server events, drop the live socket, or refuse new upgrades.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use protocol::{Author, Board, BoardCreator, BoardDetail, BoardUpdate, ChatMessage, ClientEvent, NewBoard, ServerEvent};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::ClientConfig;

enum Push {
    Event(ServerEvent),
    Drop,
}

#[derive(Clone)]
struct FixtureState {
    inbound: mpsc::UnboundedSender<ClientEvent>,
    push: Arc<Mutex<Option<mpsc::UnboundedSender<Push>>>>,
    posts: Arc<Mutex<Vec<ChatMessage>>>,
    boards: Arc<Mutex<Vec<Board>>>,
    refuse: Arc<AtomicBool>,
    connects: Arc<AtomicUsize>,
    history_requests: Arc<AtomicUsize>,
}

pub struct Fixture {
    pub base_url: String,
    inbound: mpsc::UnboundedReceiver<ClientEvent>,
    state: FixtureState,
}

impl Fixture {
    pub async fn start() -> Self {
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let state = FixtureState {
            inbound: inbound_tx,
            push: Arc::new(Mutex::new(None)),
            posts: Arc::new(Mutex::new(Vec::new())),
            boards: Arc::new(Mutex::new(Vec::new())),
            refuse: Arc::new(AtomicBool::new(false)),
            connects: Arc::new(AtomicUsize::new(0)),
            history_requests: Arc::new(AtomicUsize::new(0)),
        };

        let app = Router::new()
            .route("/api/ws", get(ws_upgrade))
            .route("/api/discussions/project/{project_id}/boards", get(project_boards))
            .route("/api/discussions/boards", axum::routing::post(create_board))
            .route("/api/discussions/boards/{board_id}", get(get_board).put(update_board))
            .route("/api/discussions/boards/{board_id}/posts", get(posts))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url: format!("http://{addr}"), inbound, state }
    }

    /// Client config pointed at this fixture with a fast reconnect policy.
    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            reconnect_attempts: 3,
            reconnect_delay: Duration::from_millis(20),
            ..ClientConfig::new(self.base_url.clone())
        }
    }

    pub fn set_posts(&self, posts: Vec<ChatMessage>) {
        *self.state.posts.lock().unwrap_or_else(PoisonError::into_inner) = posts;
    }

    pub fn add_board(&self, board: Board) {
        self.state.boards.lock().unwrap_or_else(PoisonError::into_inner).push(board);
    }

    /// Push an event to the most recent socket. Returns false if none is live.
    pub fn push(&self, event: ServerEvent) -> bool {
        self.send(Push::Event(event))
    }

    /// Close the most recent socket without a close handshake.
    pub fn drop_connection(&self) -> bool {
        self.send(Push::Drop)
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.state.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn history_requests(&self) -> usize {
        self.state.history_requests.load(Ordering::SeqCst)
    }

    /// Next event the client sent, failing the test after two seconds.
    pub async fn next_inbound(&mut self) -> ClientEvent {
        tokio::time::timeout(Duration::from_secs(2), self.inbound.recv())
            .await
            .expect("timed out waiting for client event")
            .expect("fixture inbound channel closed")
    }

    /// Skip client events until one matches.
    pub async fn next_matching(&mut self, pred: impl Fn(&ClientEvent) -> bool) -> ClientEvent {
        loop {
            let event = self.next_inbound().await;
            if pred(&event) {
                return event;
            }
        }
    }

    pub async fn wait_for_connects(&self, expected: usize) {
        for _ in 0..200 {
            if self.connects() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {expected} websocket connects, saw {}", self.connects());
    }

    fn send(&self, push: Push) -> bool {
        let slot = self.state.push.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().is_some_and(|tx| tx.send(push).is_ok())
    }
}

pub fn message(board_id: Uuid, username: &str, content: &str, created_at: i64) -> ChatMessage {
    let user_id = Uuid::new_v4();
    ChatMessage {
        id: Uuid::new_v4(),
        board_id,
        user_id,
        content: Some(content.to_owned()),
        file_name: None,
        file_url: None,
        created_at: OffsetDateTime::from_unix_timestamp(created_at).unwrap(),
        user: Author { id: user_id, username: username.to_owned(), first_name: None, last_name: None },
    }
}

pub fn board(project_id: Uuid, name: &str) -> Board {
    let creator = Uuid::new_v4();
    Board {
        id: Uuid::new_v4(),
        project_id,
        name: name.to_owned(),
        description: None,
        created_by_id: creator,
        created_at: OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
        created_by: BoardCreator { id: creator, username: "owner".to_owned() },
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<FixtureState>) -> Response {
    if state.refuse.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    ws.on_upgrade(move |socket| run_socket(socket, state))
}

async fn run_socket(mut socket: WebSocket, state: FixtureState) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    *state.push.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
    state.connects.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            frame = socket.recv() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(event) = ClientEvent::from_text(text.as_str()) {
                        let _ = state.inbound.send(event);
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },
            push = rx.recv() => match push {
                Some(Push::Event(event)) => {
                    let text = event.to_text().unwrap();
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(Push::Drop) | None => break,
            },
        }
    }
}

async fn project_boards(State(state): State<FixtureState>, Path(project_id): Path<Uuid>) -> Json<Vec<Board>> {
    let boards = state.boards.lock().unwrap_or_else(PoisonError::into_inner);
    Json(boards.iter().filter(|b| b.project_id == project_id).cloned().collect())
}

fn board_not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "Board not found" }))).into_response()
}

async fn get_board(State(state): State<FixtureState>, Path(board_id): Path<Uuid>) -> Response {
    let found = state
        .boards
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .find(|b| b.id == board_id)
        .cloned();
    let Some(board) = found else {
        return board_not_found();
    };
    let all_posts = state.posts.lock().unwrap_or_else(PoisonError::into_inner);
    let posts = all_posts.iter().filter(|m| m.board_id == board_id).cloned().collect();
    Json(BoardDetail { board, project: None, posts }).into_response()
}

async fn update_board(
    State(state): State<FixtureState>,
    Path(board_id): Path<Uuid>,
    Json(body): Json<BoardUpdate>,
) -> Response {
    if body.name.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": "Board name is required" })))
            .into_response();
    }
    let mut boards = state.boards.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(board) = boards.iter_mut().find(|b| b.id == board_id) else {
        return board_not_found();
    };
    board.name = body.name.trim().to_owned();
    board.description = body.description;
    Json(board.clone()).into_response()
}

async fn posts(State(state): State<FixtureState>, Path(board_id): Path<Uuid>) -> Json<Vec<ChatMessage>> {
    state.history_requests.fetch_add(1, Ordering::SeqCst);
    let posts = state.posts.lock().unwrap_or_else(PoisonError::into_inner);
    Json(posts.iter().filter(|m| m.board_id == board_id).cloned().collect())
}

async fn create_board(State(state): State<FixtureState>, Json(body): Json<NewBoard>) -> Response {
    if body.name.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": "Board name is required" })))
            .into_response();
    }
    let mut created = board(body.project_id, body.name.trim());
    created.description = body.description;
    created.created_by_id = body.created_by_id;
    created.created_by.id = body.created_by_id;
    state.boards.lock().unwrap_or_else(PoisonError::into_inner).push(created.clone());
    (StatusCode::CREATED, Json(created)).into_response()
}
