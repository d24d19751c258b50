use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::openai_client::{OpenAiClient, OpenAiError};
use crate::application::ports::generation_provider::{
    GenerationProvider, GenerationProviderError, GenerationRequest, GenerationResponse,
};
use crate::domain::entities::ChatMessage;

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl From<OpenAiError> for GenerationProviderError {
    fn from(error: OpenAiError) -> Self {
        match error {
            OpenAiError::Request(msg) => GenerationProviderError::NetworkError(msg),
            OpenAiError::Timeout(msg) => GenerationProviderError::Timeout(msg),
            OpenAiError::Api { status, message } => {
                GenerationProviderError::ApiError(format!("{}: {}", status, message))
            }
            OpenAiError::Parse(msg) => GenerationProviderError::InvalidResponse(msg),
        }
    }
}

/// `POST {base}/chat/completions`; the first choice's content is returned untouched.
pub struct OpenAiGenerationProvider {
    client: OpenAiClient,
    model: String,
}

impl OpenAiGenerationProvider {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl GenerationProvider for OpenAiGenerationProvider {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationProviderError> {
        debug!(model = %self.model, messages = request.messages.len(), "Requesting completion");

        let response: ChatCompletionResponse = self
            .client
            .post_json(
                "chat/completions",
                &ChatCompletionRequest {
                    model: &self.model,
                    messages: &request.messages,
                    temperature: request.temperature,
                },
            )
            .await?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            GenerationProviderError::InvalidResponse("Completion has no choices".to_string())
        })?;
        let text = choice.message.content.ok_or_else(|| {
            GenerationProviderError::InvalidResponse("Completion has no content".to_string())
        })?;

        Ok(GenerationResponse {
            text,
            model_name: response.model.unwrap_or_else(|| self.model.clone()),
            finish_reason: choice.finish_reason,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
