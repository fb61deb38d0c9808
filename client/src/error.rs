//! Client error type.

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The base URL is not `http://` or `https://`.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    /// An HTTP request to the server failed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("server responded {status}: {message}")]
    Status { status: reqwest::StatusCode, message: String },
    /// The WebSocket connection or handshake failed.
    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    /// Local input was rejected before anything was sent.
    #[error("{0}")]
    Validation(&'static str),
    /// The transport is not connected or the session has shut down.
    #[error("session closed")]
    Closed,
    /// A frame could not be encoded or decoded.
    #[error("frame codec failed: {0}")]
    Json(#[from] protocol::CodecError),
}
