use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::infrastructure::config::OpenAiConfig;

#[derive(Debug, Clone)]
pub struct OpenAiClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_factor: f64,
    pub backoff_base_ms: u64,
}

impl OpenAiClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout_secs: 30,
            max_retries: 0,
            backoff_factor: 1.5,
            backoff_base_ms: 1000,
        }
    }

    pub fn from_config(config: &OpenAiConfig, api_key: &str) -> Self {
        Self {
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            ..Self::new(config.base_url.clone(), api_key)
        }
    }
}

#[derive(Debug, Error)]
pub enum OpenAiError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl OpenAiError {
    fn is_retryable(&self) -> bool {
        match self {
            OpenAiError::Request(_) | OpenAiError::Timeout(_) => true,
            OpenAiError::Api { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            OpenAiError::Parse(_) => false,
        }
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// JSON-over-HTTPS client for OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    config: OpenAiClientConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    pub async fn post_json<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp, OpenAiError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.execute_request(path, request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempts <= self.config.max_retries => {
                    let backoff_time = Duration::from_millis(
                        (self.config.backoff_factor.powi(attempts as i32 - 1)
                            * self.config.backoff_base_ms as f64) as u64,
                    );
                    warn!(
                        path,
                        attempt = attempts,
                        error = %e,
                        backoff_ms = backoff_time.as_millis() as u64,
                        "Retrying request"
                    );
                    tokio::time::sleep(backoff_time).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn execute_request<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp, OpenAiError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.config.base_url, path.trim_start_matches('/'));
        debug!(url = %url, "POST");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OpenAiError::Timeout(e.without_url().to_string())
                } else {
                    OpenAiError::Request(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(OpenAiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<Resp>().await.map_err(|e| {
            if e.is_timeout() {
                OpenAiError::Timeout(e.without_url().to_string())
            } else {
                OpenAiError::Parse(e.without_url().to_string())
            }
        })
    }
}
