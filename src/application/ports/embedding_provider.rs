use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingProviderError {
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
}

#[derive(Debug, Clone)]
pub struct BatchEmbeddingRequest {
    pub texts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BatchEmbeddingResponse {
    pub embeddings: Vec<Vec<f32>>,
    pub model_name: String,
    pub total_tokens: Option<u32>,
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn generate_embeddings(
        &self,
        request: BatchEmbeddingRequest,
    ) -> Result<BatchEmbeddingResponse, EmbeddingProviderError>;

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingProviderError> {
        let response = self
            .generate_embeddings(BatchEmbeddingRequest {
                texts: vec![text.to_string()],
            })
            .await?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingProviderError::InvalidResponse("No embeddings returned".to_string()))
    }

    fn model_name(&self) -> &str;
}
