use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::application::use_cases::QueryError;
use crate::presentation::http::dto::ApiResponse;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    IndexUnavailable(String),
    UpstreamService(String),
}

impl From<QueryError> for AppError {
    fn from(error: QueryError) -> Self {
        match error {
            QueryError::InvalidQuery(_) => AppError::BadRequest(error.to_string()),
            QueryError::IndexNotFound(_) | QueryError::IndexUnavailable(_) => {
                AppError::IndexUnavailable(error.to_string())
            }
            QueryError::EmbeddingService(_) | QueryError::GenerationService(_) => {
                AppError::UpstreamService(error.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "INVALID_QUERY", msg),
            AppError::IndexUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "INDEX_UNAVAILABLE", msg)
            }
            AppError::UpstreamService(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_FAILED", msg),
        };

        (status, Json(ApiResponse::<()>::error(code, message))).into_response()
    }
}
