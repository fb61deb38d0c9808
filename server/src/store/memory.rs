//! In-memory `ChatStore` for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use protocol::{Author, Board, BoardCreator, BoardUpdate, ChatMessage, NewBoard, ProjectSummary};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::{ChatStore, NewMessage, StoreError};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, Author>,
    projects: HashMap<Uuid, ProjectSummary>,
    boards: Vec<Board>,
    messages: Vec<ChatMessage>,
    /// Monotonic clock so insertion order and `created_at` order agree.
    tick: i64,
}

impl Tables {
    fn next_timestamp(&mut self) -> OffsetDateTime {
        self.tick += 1;
        OffsetDateTime::UNIX_EPOCH + Duration::days(20_000) + Duration::milliseconds(self.tick)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_user(&self, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().users.insert(
            id,
            Author { id, username: username.to_owned(), first_name: None, last_name: None },
        );
        id
    }

    pub fn add_project(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().projects.insert(id, ProjectSummary { id, name: name.to_owned(), description: None });
        id
    }

    pub fn add_board(&self, project_id: Uuid, name: &str, created_by_id: Uuid) -> Uuid {
        let mut tables = self.lock();
        let username = tables.users.get(&created_by_id).map(|u| u.username.clone()).unwrap_or_default();
        let id = Uuid::new_v4();
        let created_at = tables.next_timestamp();
        tables.boards.push(Board {
            id,
            project_id,
            name: name.to_owned(),
            description: None,
            created_by_id,
            created_at,
            created_by: BoardCreator { id: created_by_id, username },
        });
        id
    }

    /// Make every subsequent write fail as if the pool were exhausted.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn message_count(&self) -> usize {
        self.lock().messages.len()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn board_exists(&self, board_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.lock().boards.iter().any(|b| b.id == board_id))
    }

    async fn user_exists(&self, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.lock().users.contains_key(&user_id))
    }

    async fn create_message(&self, message: NewMessage) -> Result<ChatMessage, StoreError> {
        self.check_writable()?;
        let mut tables = self.lock();
        let user = tables
            .users
            .get(&message.user_id)
            .cloned()
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;
        let created_at = tables.next_timestamp();
        let row = ChatMessage {
            id: Uuid::new_v4(),
            board_id: message.board_id,
            user_id: message.user_id,
            content: message.content,
            file_name: message.file_name,
            file_url: message.file_data,
            created_at,
            user,
        };
        tables.messages.push(row.clone());
        Ok(row)
    }

    async fn list_messages(&self, board_id: Uuid) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(self.lock().messages.iter().filter(|m| m.board_id == board_id).cloned().collect())
    }

    async fn list_boards(&self, project_id: Uuid) -> Result<Vec<Board>, StoreError> {
        Ok(self.lock().boards.iter().filter(|b| b.project_id == project_id).cloned().collect())
    }

    async fn get_board(&self, board_id: Uuid) -> Result<Option<Board>, StoreError> {
        Ok(self.lock().boards.iter().find(|b| b.id == board_id).cloned())
    }

    async fn create_board(&self, board: NewBoard) -> Result<Board, StoreError> {
        self.check_writable()?;
        let mut tables = self.lock();
        let username = tables
            .users
            .get(&board.created_by_id)
            .map(|u| u.username.clone())
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;
        let created_at = tables.next_timestamp();
        let row = Board {
            id: Uuid::new_v4(),
            project_id: board.project_id,
            name: board.name,
            description: board.description,
            created_by_id: board.created_by_id,
            created_at,
            created_by: BoardCreator { id: board.created_by_id, username },
        };
        tables.boards.push(row.clone());
        Ok(row)
    }

    async fn update_board(&self, board_id: Uuid, update: BoardUpdate) -> Result<Option<Board>, StoreError> {
        self.check_writable()?;
        let mut tables = self.lock();
        let Some(board) = tables.boards.iter_mut().find(|b| b.id == board_id) else {
            return Ok(None);
        };
        board.name = update.name;
        board.description = update.description;
        Ok(Some(board.clone()))
    }

    async fn get_project(&self, project_id: Uuid) -> Result<Option<ProjectSummary>, StoreError> {
        Ok(self.lock().projects.get(&project_id).cloned())
    }
}
