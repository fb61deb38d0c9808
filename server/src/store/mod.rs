//! Persistence collaborator for boards and discussion posts.
//!
//! ARCHITECTURE
//! ============
//! The realtime core never touches SQL directly. It talks to a `ChatStore`,
//! which production backs with Postgres and tests back with an in-memory
//! table set. Every method is a suspension point; nothing else in the
//! message path awaits.

pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use protocol::{Board, BoardUpdate, ChatMessage, NewBoard, ProjectSummary};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// The write referenced a row that does not exist.
    #[must_use]
    pub fn is_foreign_key_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db)) => db.is_foreign_key_violation(),
            Self::Database(_) => false,
        }
    }
}

/// A validated message ready to be written.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub board_id: Uuid,
    pub user_id: Uuid,
    /// Trimmed text, `None` when the message is attachment-only.
    pub content: Option<String>,
    pub file_name: Option<String>,
    /// Attachment as a `data:` URI.
    pub file_data: Option<String>,
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn board_exists(&self, board_id: Uuid) -> Result<bool, StoreError>;

    async fn user_exists(&self, user_id: Uuid) -> Result<bool, StoreError>;

    /// Insert a post and return it joined with its author.
    async fn create_message(&self, message: NewMessage) -> Result<ChatMessage, StoreError>;

    /// All posts of a board, oldest first.
    async fn list_messages(&self, board_id: Uuid) -> Result<Vec<ChatMessage>, StoreError>;

    async fn list_boards(&self, project_id: Uuid) -> Result<Vec<Board>, StoreError>;

    async fn get_board(&self, board_id: Uuid) -> Result<Option<Board>, StoreError>;

    async fn create_board(&self, board: NewBoard) -> Result<Board, StoreError>;

    /// Replace a board's name and description. `None` if the board is gone.
    async fn update_board(&self, board_id: Uuid, update: BoardUpdate) -> Result<Option<Board>, StoreError>;

    async fn get_project(&self, project_id: Uuid) -> Result<Option<ProjectSummary>, StoreError>;
}
