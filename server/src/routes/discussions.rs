//! Discussion board REST routes.
//!
//! Thin handlers over `ChatStore`: list a project's boards, fetch one board
//! with its project and posts, create or update a board, and load a board's
//! post history.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use protocol::{Board, BoardDetail, BoardUpdate, ChatMessage, NewBoard};
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::services::validate::non_blank;
use crate::state::AppState;
use crate::store::StoreError;

/// JSON error body `{"error": "..."}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    const fn new(status: StatusCode, message: &'static str) -> Self {
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

fn store_error(context: &'static str, err: StoreError) -> ApiError {
    if err.is_foreign_key_violation() {
        return ApiError::new(StatusCode::BAD_REQUEST, "referenced project or user does not exist");
    }
    error!(error = %err, "discussions: {context} failed");
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, context)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBoardBody {
    pub project_id: Option<Uuid>,
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub created_by_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBoardBody {
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// `GET /api/discussions/project/{project_id}/boards`
pub async fn list_project_boards(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<Board>>, ApiError> {
    let boards = state
        .store
        .list_boards(project_id)
        .await
        .map_err(|e| store_error("failed to fetch discussion boards", e))?;
    Ok(Json(boards))
}

/// `GET /api/discussions/boards/{board_id}`, with the project and the
/// posts oldest first.
pub async fn get_board(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
) -> Result<Json<BoardDetail>, ApiError> {
    let board = state
        .store
        .get_board(board_id)
        .await
        .map_err(|e| store_error("failed to fetch discussion board", e))?
        .ok_or(ApiError::new(StatusCode::NOT_FOUND, "discussion board not found"))?;
    let project = state
        .store
        .get_project(board.project_id)
        .await
        .map_err(|e| store_error("failed to fetch discussion board", e))?;
    let posts = state
        .store
        .list_messages(board_id)
        .await
        .map_err(|e| store_error("failed to fetch discussion board", e))?;
    Ok(Json(BoardDetail { board, project, posts }))
}

/// `POST /api/discussions/boards`
pub async fn create_board(
    State(state): State<AppState>,
    Json(body): Json<CreateBoardBody>,
) -> Result<(StatusCode, Json<Board>), ApiError> {
    let (Some(project_id), Some(name), Some(created_by_id)) = (body.project_id, non_blank(body.name), body.created_by_id)
    else {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "project id, name, and creator id are required"));
    };

    let board = state
        .store
        .create_board(NewBoard { project_id, name, description: non_blank(body.description), created_by_id })
        .await
        .map_err(|e| store_error("failed to create discussion board", e))?;

    info!(board_id = %board.id, %project_id, "discussions: board created");
    Ok((StatusCode::CREATED, Json(board)))
}

/// `PUT /api/discussions/boards/{board_id}`
pub async fn update_board(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Json(body): Json<UpdateBoardBody>,
) -> Result<Json<Board>, ApiError> {
    let Some(name) = non_blank(body.name) else {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "name is required"));
    };

    let board = state
        .store
        .update_board(board_id, BoardUpdate { name, description: non_blank(body.description) })
        .await
        .map_err(|e| store_error("failed to update discussion board", e))?
        .ok_or(ApiError::new(StatusCode::NOT_FOUND, "discussion board not found"))?;

    info!(%board_id, "discussions: board updated");
    Ok(Json(board))
}

/// `GET /api/discussions/boards/{board_id}/posts`, oldest first.
pub async fn list_board_posts(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let posts = state
        .store
        .list_messages(board_id)
        .await
        .map_err(|e| store_error("failed to fetch posts", e))?;
    Ok(Json(posts))
}

#[cfg(test)]
#[path = "discussions_test.rs"]
mod tests;
