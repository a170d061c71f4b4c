use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use parley_shared::protocol::ErrorBody;
use parley_shared::ValidationError;
use parley_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Chat not found")]
    ChatNotFound,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Upstream completion failed: {0}")]
    Upstream(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ChatNotFound(_) => ServerError::ChatNotFound,
            other => ServerError::Store(other),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::ChatNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Authentication(_)
            | ServerError::Upstream(_)
            | ServerError::Store(_) => {
                tracing::error!(error = %self, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to process request".to_string(),
                )
            }
        };

        (status, axum::Json(ErrorBody { error: message })).into_response()
    }
}
