use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::application::QuerySettings;
use crate::application::services::prompt_builder::DEFAULT_SYSTEM_INSTRUCTION;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0} is not set")]
    MissingApiKey(&'static str),
}

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub embedding_model: String,
    pub embedding_batch_size: usize,
    pub chat_model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Everything the binary needs, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub source_document: PathBuf,
    pub index_path: PathBuf,
    pub chunking: ChunkingConfig,
    pub openai: OpenAiConfig,
    pub query: QuerySettings,
    pub server: ServerConfig,
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn string(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds and validates the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = Self {
            source_document: PathBuf::from(string(
                &lookup,
                "RAG_SOURCE_DOCUMENT",
                "data/Compendium_Food_Additives_Regulations_20_12_2022.pdf",
            )),
            index_path: PathBuf::from(string(&lookup, "RAG_INDEX_PATH", "vector_store/index")),
            chunking: ChunkingConfig {
                chunk_size: parse(&lookup, "RAG_CHUNK_SIZE", 1000)?,
                chunk_overlap: parse(&lookup, "RAG_CHUNK_OVERLAP", 100)?,
            },
            openai: OpenAiConfig {
                api_key: lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
                base_url: string(&lookup, "OPENAI_BASE_URL", "https://api.openai.com/v1")
                    .trim_end_matches('/')
                    .to_string(),
                embedding_model: string(&lookup, "RAG_EMBEDDING_MODEL", "text-embedding-3-small"),
                embedding_batch_size: parse(&lookup, "RAG_EMBEDDING_BATCH_SIZE", 64)?,
                chat_model: string(&lookup, "RAG_CHAT_MODEL", "gpt-4o-mini"),
                timeout_secs: parse(&lookup, "RAG_HTTP_TIMEOUT_SECS", 30)?,
                max_retries: parse(&lookup, "RAG_MAX_RETRIES", 0)?,
            },
            query: QuerySettings {
                top_k: parse(&lookup, "RAG_TOP_K", 4)?,
                temperature: parse(&lookup, "RAG_CHAT_TEMPERATURE", 0.7)?,
                system_instruction: string(&lookup, "RAG_SYSTEM_PROMPT", DEFAULT_SYSTEM_INSTRUCTION),
            },
            server: ServerConfig {
                host: string(&lookup, "RAG_SERVER_HOST", "0.0.0.0"),
                port: parse(&lookup, "RAG_SERVER_PORT", 3000)?,
                request_timeout_secs: parse(&lookup, "RAG_REQUEST_TIMEOUT_SECS", 60)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &'static str, value: String, reason: &str| ConfigError::InvalidValue {
            key,
            value,
            reason: reason.to_string(),
        };

        if self.chunking.chunk_size == 0 {
            return Err(invalid("RAG_CHUNK_SIZE", "0".to_string(), "must be at least 1"));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(invalid(
                "RAG_CHUNK_OVERLAP",
                self.chunking.chunk_overlap.to_string(),
                "must be smaller than RAG_CHUNK_SIZE",
            ));
        }
        if self.query.top_k == 0 {
            return Err(invalid("RAG_TOP_K", "0".to_string(), "must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.query.temperature) {
            return Err(invalid(
                "RAG_CHAT_TEMPERATURE",
                self.query.temperature.to_string(),
                "must be between 0.0 and 2.0",
            ));
        }
        if self.openai.embedding_batch_size == 0 {
            return Err(invalid(
                "RAG_EMBEDDING_BATCH_SIZE",
                "0".to_string(),
                "must be at least 1",
            ));
        }
        if self.openai.timeout_secs == 0 {
            return Err(invalid("RAG_HTTP_TIMEOUT_SECS", "0".to_string(), "must be at least 1"));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(invalid(
                "RAG_REQUEST_TIMEOUT_SECS",
                "0".to_string(),
                "must be at least 1",
            ));
        }

        Ok(())
    }

    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.openai
            .api_key
            .as_deref()
            .ok_or(ConfigError::MissingApiKey("OPENAI_API_KEY"))
    }
}
