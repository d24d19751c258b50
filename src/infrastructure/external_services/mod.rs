pub mod document_extractors;
pub mod openai_client;
pub mod openai_embedding_provider;
pub mod openai_generation_provider;

pub use openai_client::{OpenAiClient, OpenAiClientConfig, OpenAiError};
pub use openai_embedding_provider::OpenAiEmbeddingProvider;
pub use openai_generation_provider::OpenAiGenerationProvider;
