use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::application::use_cases::{QueryError, QueryPipeline};
use crate::presentation::http::dto::{AnswerRequestDto, AnswerResponseDto, ApiResponse};
use crate::presentation::http::errors::AppError;

pub struct AnswerHandler {
    pipeline: Arc<QueryPipeline>,
    request_timeout: Duration,
}

impl AnswerHandler {
    pub fn new(pipeline: Arc<QueryPipeline>, request_timeout: Duration) -> Self {
        Self {
            pipeline,
            request_timeout,
        }
    }

    pub async fn answer(
        State(handler): State<Arc<AnswerHandler>>,
        payload: Result<Json<AnswerRequestDto>, JsonRejection>,
    ) -> Result<impl IntoResponse, AppError> {
        let start_time = Instant::now();
        let Json(request) =
            payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

        // the pipeline has no deadline of its own; the caller bounds each request
        let outcome = tokio::time::timeout(
            handler.request_timeout,
            handler.pipeline.answer_with_sources(&request.question),
        )
        .await
        .map_err(|_| {
            warn!(timeout_secs = handler.request_timeout.as_secs(), "Answer timed out");
            QueryError::GenerationService(format!(
                "No answer within {} seconds",
                handler.request_timeout.as_secs()
            ))
        })??;

        let dto = AnswerResponseDto::from_outcome(outcome, start_time.elapsed().as_millis() as u64);
        Ok((StatusCode::OK, Json(ApiResponse::success(dto))))
    }
}
