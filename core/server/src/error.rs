use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use study_desk_engine::{NormalizeError, ScheduleError};
use thiserror::Error;
use tracing::{error, warn};

use crate::extract::ExtractError;
use crate::llm::CompletionError;

/// Everything a handler can fail with, mapped onto an HTTP status.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    InvalidRequest(String),
    #[error(transparent)]
    MalformedResponse(#[from] NormalizeError),
    #[error("language model request failed: {0:#}")]
    Upstream(anyhow::Error),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MalformedResponse(_) | ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Schedule(_) | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CompletionError> for ApiError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Upstream(inner) => ApiError::Upstream(inner),
            CompletionError::Malformed(inner) => ApiError::MalformedResponse(inner),
        }
    }
}

impl From<ExtractError> for ApiError {
    fn from(err: ExtractError) -> Self {
        ApiError::InvalidRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        (status, Json(serde_json::json!({ "message": self.to_string() }))).into_response()
    }
}
