//! Engine error taxonomy and its HTTP mapping.
//!
//! Everything the engine can fail with is recovered into one of these typed
//! variants at the engine boundary. The waiting-for-participants condition is
//! deliberately *not* here: it is a valid transient state and travels as a
//! `RoomView::Waiting` payload instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::store::StoreError;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed input: empty ids, blank names, bad payloads.
    #[error("{0}")]
    Validation(String),

    /// Room or collection does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Wrong password, caller not a participant, or the room is closed for
    /// the attempted action.
    #[error("{0}")]
    NotAllowed(String),

    /// Durable storage says the room is open but no in-memory session exists
    /// (process restart). Recoverable: the client should reconnect.
    #[error("no live session for room {0}; reconnect to continue")]
    SessionMissing(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Stable machine-readable code for the HTTP error body.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::NotAllowed(_) => "NOT_ALLOWED",
            EngineError::SessionMissing(_) => "SESSION_MISSING",
            EngineError::Store(_) => "STORE_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::NotAllowed(_) => StatusCode::FORBIDDEN,
            // 409 tells well-behaved clients to reconnect rather than error out
            EngineError::SessionMissing(_) => StatusCode::CONFLICT,
            EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        if let EngineError::Store(ref e) = self {
            tracing::error!("store failure surfaced to client: {}", e);
        }
        let body = serde_json::json!({
            "code": self.code(),
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}
