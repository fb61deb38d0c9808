//! REST client for the discussion endpoints.

use protocol::{Board, BoardDetail, BoardUpdate, ChatMessage, NewBoard};
use reqwest::Response;
use uuid::Uuid;

use crate::error::ClientError;

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.trim_end_matches('/').to_owned() }
    }

    /// `GET /api/discussions/project/{project_id}/boards`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    pub async fn fetch_project_boards(&self, project_id: Uuid) -> Result<Vec<Board>, ClientError> {
        let resp = self
            .http
            .get(format!("{}/api/discussions/project/{project_id}/boards", self.base_url))
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// `GET /api/discussions/boards/{board_id}`, with its project and posts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Status`] with 404 if the board does not exist.
    pub async fn fetch_board(&self, board_id: Uuid) -> Result<BoardDetail, ClientError> {
        let resp = self
            .http
            .get(format!("{}/api/discussions/boards/{board_id}", self.base_url))
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// `GET /api/discussions/boards/{board_id}/posts`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    pub async fn fetch_board_posts(&self, board_id: Uuid) -> Result<Vec<ChatMessage>, ClientError> {
        let resp = self
            .http
            .get(format!("{}/api/discussions/boards/{board_id}/posts", self.base_url))
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// `POST /api/discussions/boards`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Status`] with 400 if required fields are missing.
    pub async fn create_board(&self, board: &NewBoard) -> Result<Board, ClientError> {
        let resp = self
            .http
            .post(format!("{}/api/discussions/boards", self.base_url))
            .json(board)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// `PUT /api/discussions/boards/{board_id}`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Status`] with 400 for a blank name and 404 if
    /// the board does not exist.
    pub async fn update_board(&self, board_id: Uuid, update: &BoardUpdate) -> Result<Board, ClientError> {
        let resp = self
            .http
            .put(format!("{}/api/discussions/boards/{board_id}", self.base_url))
            .json(update)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }
}

/// Turn a non-success response into [`ClientError::Status`], keeping the
/// server's `{"error": ...}` message when there is one.
async fn check(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(serde_json::Value::as_str).map(str::to_owned))
        .unwrap_or(body);
    Err(ClientError::Status { status, message })
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
