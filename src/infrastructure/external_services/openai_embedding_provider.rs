use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::openai_client::{OpenAiClient, OpenAiError};
use crate::application::ports::embedding_provider::{
    BatchEmbeddingRequest, BatchEmbeddingResponse, EmbeddingProvider, EmbeddingProviderError,
};

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: u32,
}

impl From<OpenAiError> for EmbeddingProviderError {
    fn from(error: OpenAiError) -> Self {
        match error {
            OpenAiError::Request(msg) => EmbeddingProviderError::NetworkError(msg),
            OpenAiError::Timeout(msg) => EmbeddingProviderError::Timeout(msg),
            OpenAiError::Api { status, message } => {
                EmbeddingProviderError::ApiError(format!("{}: {}", status, message))
            }
            OpenAiError::Parse(msg) => EmbeddingProviderError::InvalidResponse(msg),
        }
    }
}

/// `POST {base}/embeddings`, one call per batch.
pub struct OpenAiEmbeddingProvider {
    client: OpenAiClient,
    model: String,
}

impl OpenAiEmbeddingProvider {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn generate_embeddings(
        &self,
        request: BatchEmbeddingRequest,
    ) -> Result<BatchEmbeddingResponse, EmbeddingProviderError> {
        if request.texts.is_empty() {
            return Ok(BatchEmbeddingResponse {
                embeddings: Vec::new(),
                model_name: self.model.clone(),
                total_tokens: None,
            });
        }

        debug!(model = %self.model, texts = request.texts.len(), "Requesting embeddings");

        let response: EmbeddingsResponse = self
            .client
            .post_json(
                "embeddings",
                &EmbeddingsRequest {
                    model: &self.model,
                    input: &request.texts,
                },
            )
            .await?;

        if response.data.len() != request.texts.len() {
            return Err(EmbeddingProviderError::InvalidResponse(format!(
                "Requested {} embeddings, received {}",
                request.texts.len(),
                response.data.len()
            )));
        }

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        if data.iter().enumerate().any(|(i, d)| d.index != i) {
            return Err(EmbeddingProviderError::InvalidResponse(
                "Embedding indices do not cover the request".to_string(),
            ));
        }

        Ok(BatchEmbeddingResponse {
            embeddings: data.into_iter().map(|d| d.embedding).collect(),
            model_name: response.model.unwrap_or_else(|| self.model.clone()),
            total_tokens: response.usage.map(|u| u.total_tokens),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
