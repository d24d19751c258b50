use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::ChatMessage;

#[derive(Debug, Error)]
pub enum GenerationProviderError {
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
pub struct GenerationRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub text: String,
    pub model_name: String,
    pub finish_reason: Option<String>,
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationProviderError>;

    fn model_name(&self) -> &str;
}
