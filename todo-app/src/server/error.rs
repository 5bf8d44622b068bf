//! Mapping of domain errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use todo_search_repository::SearchIndexError;
use todo_store_repository::ItemStoreError;
use todo_sync::SyncError;
use tracing::{error, warn};

/// Error returned by request handlers.
///
/// Rendered as `{"status": "error", "message": ...}` with a status code
/// derived from the underlying failure.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] ItemStoreError),

    #[error(transparent)]
    Search(#[from] SearchIndexError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("No item matches the filter")]
    NoMatch,
}

fn store_status(err: &ItemStoreError) -> StatusCode {
    match err {
        ItemStoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        ItemStoreError::Conflict { .. } => StatusCode::CONFLICT,
        ItemStoreError::ValidationError(_) => StatusCode::BAD_REQUEST,
        ItemStoreError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn search_status(err: &SearchIndexError) -> StatusCode {
    match err {
        SearchIndexError::ValidationError(_) | SearchIndexError::BatchSizeExceeded { .. } => {
            StatusCode::BAD_REQUEST
        }
        SearchIndexError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
        SearchIndexError::TimeoutError(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(e) => store_status(e),
            ApiError::Search(e) => search_status(e),
            ApiError::Sync(SyncError::StoreError(e)) => store_status(e),
            ApiError::Sync(SyncError::SearchError(e)) => search_status(e),
            ApiError::Sync(SyncError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Sync(SyncError::LeaseHeld(_)) => StatusCode::CONFLICT,
            ApiError::Sync(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NoMatch => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        (
            status,
            Json(json!({
                "status": "error",
                "message": self.to_string()
            })),
        )
            .into_response()
    }
}
