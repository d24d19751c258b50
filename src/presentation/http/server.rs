use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::presentation::http::{
    handlers::AnswerHandler,
    routes::{answer_routes, health_routes},
};

/// Questions are small; anything bigger than this is rejected before parsing.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

pub struct HttpServer {
    answer_handler: Arc<AnswerHandler>,
    bind_address: String,
}

impl HttpServer {
    pub fn new(answer_handler: Arc<AnswerHandler>, bind_address: String) -> Self {
        Self {
            answer_handler,
            bind_address,
        }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .merge(health_routes())
            .merge(answer_routes(self.answer_handler.clone()))
            .layer(cors)
            .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
            .layer(
                TraceLayer::new_for_http()
                    .on_request(
                        |request: &axum::http::Request<axum::body::Body>, _span: &tracing::Span| {
                            tracing::info!(
                                "Received request: {} {}",
                                request.method(),
                                request.uri()
                            );
                        },
                    )
                    .on_response(
                        |response: &axum::http::Response<axum::body::Body>,
                         latency: std::time::Duration,
                         _span: &tracing::Span| {
                            tracing::info!(
                                "Response: {} (took {} ms)",
                                response.status(),
                                latency.as_millis()
                            );
                        },
                    )
                    .on_failure(
                        |error: ServerErrorsFailureClass,
                         latency: std::time::Duration,
                         _span: &tracing::Span| {
                            tracing::error!(
                                "Request failed: {:?} (took {} ms)",
                                error,
                                latency.as_millis()
                            );
                        },
                    ),
            )
    }

    pub async fn run(self) -> Result<(), std::io::Error> {
        let app = self.router();

        let listener = TcpListener::bind(&self.bind_address).await?;
        tracing::info!(address = %self.bind_address, "Listening");
        axum::serve(listener, app).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::generation_provider::{
        GenerationProvider, GenerationProviderError, GenerationRequest, GenerationResponse,
    };
    use crate::application::services::{EmbeddingIndex, IndexBuildOptions};
    use crate::application::use_cases::{QueryPipeline, QuerySettings};
    use crate::domain::entities::Segment;
    use crate::domain::value_objects::Provenance;
    use crate::test_support::{HashingEmbedder, RecordingGenerator};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    struct StalledGenerator;

    #[async_trait]
    impl GenerationProvider for StalledGenerator {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<GenerationResponse, GenerationProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(GenerationProviderError::Timeout("never".to_string()))
        }

        fn model_name(&self) -> &str {
            "stalled"
        }
    }

    async fn server(
        generator: Arc<dyn GenerationProvider>,
        segments: Vec<Segment>,
        timeout: Duration,
    ) -> HttpServer {
        let index = EmbeddingIndex::build(
            Arc::new(HashingEmbedder::new(64)),
            segments,
            IndexBuildOptions::default(),
        )
        .await
        .unwrap();
        let pipeline =
            QueryPipeline::new(Arc::new(index), generator, &QuerySettings::default()).unwrap();

        HttpServer::new(
            Arc::new(AnswerHandler::new(Arc::new(pipeline), timeout)),
            "127.0.0.1:0".to_string(),
        )
    }

    fn corpus() -> Vec<Segment> {
        vec![
            Segment::new(
                0,
                "Aspartame  951  2500 mg/kg".to_string(),
                Provenance::table(3, 12),
                0,
                0,
            ),
            Segment::new(1, "Sorbic acid in cheese".to_string(), Provenance::page(4), 0, 0),
        ]
    }

    fn answer_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/answer")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = server(
            Arc::new(RecordingGenerator::replying("ok")),
            corpus(),
            Duration::from_secs(5),
        )
        .await
        .router();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["data"]["status"], "healthy");
    }

    #[tokio::test]
    async fn test_answer_with_sources() {
        let app = server(
            Arc::new(RecordingGenerator::replying("Up to 2500 mg/kg.")),
            corpus(),
            Duration::from_secs(5),
        )
        .await
        .router();

        let response = app
            .oneshot(answer_request(r#"{"question": "Aspartame limit?"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["answer"], "Up to 2500 mg/kg.");
        let sources = body["data"]["sources"].as_array().unwrap();
        assert_eq!(sources.len(), 2);
        let table = sources
            .iter()
            .find(|s| s["label"] == "table 3, page 12")
            .unwrap();
        assert_eq!(table["provenance"]["kind"], "table");
        assert_eq!(table["text"], "Aspartame  951  2500 mg/kg");
    }

    #[tokio::test]
    async fn test_blank_question_is_bad_request() {
        let app = server(
            Arc::new(RecordingGenerator::replying("ok")),
            corpus(),
            Duration::from_secs(5),
        )
        .await
        .router();

        let response = app.oneshot(answer_request(r#"{"question": "   "}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "INVALID_QUERY");
    }

    #[tokio::test]
    async fn test_malformed_body_uses_error_envelope() {
        let app = server(
            Arc::new(RecordingGenerator::replying("ok")),
            corpus(),
            Duration::from_secs(5),
        )
        .await
        .router();

        let response = app
            .oneshot(answer_request(r#"{"question": "Aspartame"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "INVALID_QUERY");
        assert!(!body["error"]["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_question_field_uses_error_envelope() {
        let app = server(
            Arc::new(RecordingGenerator::replying("ok")),
            corpus(),
            Duration::from_secs(5),
        )
        .await
        .router();

        let response = app.oneshot(answer_request(r#"{"query": "E211"}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "INVALID_QUERY");
    }

    #[tokio::test]
    async fn test_generation_failure_is_bad_gateway() {
        let app = server(
            Arc::new(RecordingGenerator::failing()),
            corpus(),
            Duration::from_secs(5),
        )
        .await
        .router();

        let response = app
            .oneshot(answer_request(r#"{"question": "Sorbic acid?"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_stalled_generation_times_out() {
        let app = server(Arc::new(StalledGenerator), corpus(), Duration::from_millis(50))
            .await
            .router();

        let response = app
            .oneshot(answer_request(r#"{"question": "Sorbic acid?"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = json_body(response).await;
        assert!(
            body["error"]["message"]
                .as_str()
                .unwrap()
                .contains("Generation service error")
        );
    }
}
