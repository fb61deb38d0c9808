//! Postgres-backed `ChatStore`.

use async_trait::async_trait;
use protocol::{Author, Board, BoardCreator, BoardUpdate, ChatMessage, NewBoard, ProjectSummary};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{ChatStore, NewMessage, StoreError};

type PostRow = (
    Uuid,
    Uuid,
    Uuid,
    Option<String>,
    Option<String>,
    Option<String>,
    OffsetDateTime,
    String,
    Option<String>,
    Option<String>,
);

type BoardRow = (Uuid, Uuid, String, Option<String>, Uuid, OffsetDateTime, String);

const POST_COLUMNS: &str = "p.id, p.board_id, p.user_id, p.content, p.file_name, p.file_data, p.created_at, \
                            u.username, u.first_name, u.last_name";

const BOARD_COLUMNS: &str = "b.id, b.project_id, b.name, b.description, b.created_by_id, b.created_at, u.username";

#[derive(Clone)]
pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn board_exists(&self, board_id: Uuid) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM discussion_boards WHERE id = $1)")
            .bind(board_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn user_exists(&self, user_id: Uuid) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn create_message(&self, message: NewMessage) -> Result<ChatMessage, StoreError> {
        // Insert and author join in one statement so the returned row is
        // exactly what was committed.
        let sql = format!(
            "WITH p AS (
                INSERT INTO discussion_posts (id, board_id, user_id, content, file_name, file_data)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, board_id, user_id, content, file_name, file_data, created_at
             )
             SELECT {POST_COLUMNS}
             FROM p JOIN users u ON u.id = p.user_id"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(message.board_id)
            .bind(message.user_id)
            .bind(message.content)
            .bind(message.file_name)
            .bind(message.file_data)
            .fetch_one(&self.pool)
            .await?;
        Ok(post_from_row(row))
    }

    async fn list_messages(&self, board_id: Uuid) -> Result<Vec<ChatMessage>, StoreError> {
        let sql = format!(
            "SELECT {POST_COLUMNS}
             FROM discussion_posts p JOIN users u ON u.id = p.user_id
             WHERE p.board_id = $1
             ORDER BY p.created_at ASC, p.id ASC"
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(board_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(post_from_row).collect())
    }

    async fn list_boards(&self, project_id: Uuid) -> Result<Vec<Board>, StoreError> {
        let sql = format!(
            "SELECT {BOARD_COLUMNS}
             FROM discussion_boards b JOIN users u ON u.id = b.created_by_id
             WHERE b.project_id = $1
             ORDER BY b.created_at ASC"
        );
        let rows = sqlx::query_as::<_, BoardRow>(&sql)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(board_from_row).collect())
    }

    async fn get_board(&self, board_id: Uuid) -> Result<Option<Board>, StoreError> {
        let sql = format!(
            "SELECT {BOARD_COLUMNS}
             FROM discussion_boards b JOIN users u ON u.id = b.created_by_id
             WHERE b.id = $1"
        );
        let row = sqlx::query_as::<_, BoardRow>(&sql)
            .bind(board_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(board_from_row))
    }

    async fn create_board(&self, board: NewBoard) -> Result<Board, StoreError> {
        let sql = format!(
            "WITH b AS (
                INSERT INTO discussion_boards (id, project_id, name, description, created_by_id)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, project_id, name, description, created_by_id, created_at
             )
             SELECT {BOARD_COLUMNS}
             FROM b JOIN users u ON u.id = b.created_by_id"
        );
        let row = sqlx::query_as::<_, BoardRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(board.project_id)
            .bind(board.name)
            .bind(board.description)
            .bind(board.created_by_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(board_from_row(row))
    }

    async fn update_board(&self, board_id: Uuid, update: BoardUpdate) -> Result<Option<Board>, StoreError> {
        let sql = format!(
            "WITH b AS (
                UPDATE discussion_boards SET name = $2, description = $3
                WHERE id = $1
                RETURNING id, project_id, name, description, created_by_id, created_at
             )
             SELECT {BOARD_COLUMNS}
             FROM b JOIN users u ON u.id = b.created_by_id"
        );
        let row = sqlx::query_as::<_, BoardRow>(&sql)
            .bind(board_id)
            .bind(update.name)
            .bind(update.description)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(board_from_row))
    }

    async fn get_project(&self, project_id: Uuid) -> Result<Option<ProjectSummary>, StoreError> {
        let row = sqlx::query_as::<_, (Uuid, String, Option<String>)>(
            "SELECT id, name, description FROM projects WHERE id = $1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, name, description)| ProjectSummary { id, name, description }))
    }
}

fn post_from_row(row: PostRow) -> ChatMessage {
    let (id, board_id, user_id, content, file_name, file_data, created_at, username, first_name, last_name) = row;
    ChatMessage {
        id,
        board_id,
        user_id,
        content,
        file_name,
        file_url: file_data,
        created_at,
        user: Author { id: user_id, username, first_name, last_name },
    }
}

fn board_from_row(row: BoardRow) -> Board {
    let (id, project_id, name, description, created_by_id, created_at, username) = row;
    Board {
        id,
        project_id,
        name,
        description,
        created_by_id,
        created_at,
        created_by: BoardCreator { id: created_by_id, username },
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
#[path = "postgres_test.rs"]
mod tests;
