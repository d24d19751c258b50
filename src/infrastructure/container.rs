use std::sync::Arc;

use thiserror::Error;
use tracing::info_span;

use crate::{
    application::{
        ports::{DocumentExtractor, EmbeddingProvider, GenerationProvider, IndexStore},
        services::{Chunker, ChunkingError},
        use_cases::{BuildIndexUseCase, QueryError, QueryPipeline},
    },
    infrastructure::{
        config::{AppConfig, ConfigError},
        external_services::{
            OpenAiClient, OpenAiClientConfig, OpenAiEmbeddingProvider, OpenAiGenerationProvider,
            document_extractors::{CompositeExtractor, PdfTableExtractor, PdfTextExtractor},
        },
        file_system::LocalIndexStore,
    },
    presentation::http::handlers::AnswerHandler,
};

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Wires configuration into concrete adapters. Nothing is opened or fetched
/// until a use case is requested.
pub struct AppContainer {
    config: AppConfig,
    pub embedding_provider: Arc<dyn EmbeddingProvider>,
    pub generation_provider: Arc<dyn GenerationProvider>,
    pub index_store: Arc<dyn IndexStore>,
}

impl AppContainer {
    pub fn new(config: AppConfig) -> Result<Self, ContainerError> {
        let api_key = config.api_key()?;
        let client = OpenAiClient::new(OpenAiClientConfig::from_config(&config.openai, api_key))?;

        let embedding_provider: Arc<dyn EmbeddingProvider> = Arc::new(
            OpenAiEmbeddingProvider::new(client.clone(), config.openai.embedding_model.clone()),
        );
        let generation_provider: Arc<dyn GenerationProvider> = Arc::new(
            OpenAiGenerationProvider::new(client, config.openai.chat_model.clone()),
        );
        let index_store: Arc<dyn IndexStore> =
            Arc::new(LocalIndexStore::new(config.index_path.clone()));

        Ok(Self::with_components(
            config,
            embedding_provider,
            generation_provider,
            index_store,
        ))
    }

    /// Same wiring with caller-supplied adapters.
    pub fn with_components(
        config: AppConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        generation_provider: Arc<dyn GenerationProvider>,
        index_store: Arc<dyn IndexStore>,
    ) -> Self {
        Self {
            config,
            embedding_provider,
            generation_provider,
            index_store,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn document_extractor(&self) -> Arc<dyn DocumentExtractor> {
        Arc::new(
            CompositeExtractor::new(
                Arc::new(PdfTableExtractor::new()),
                Arc::new(PdfTextExtractor::new()),
            )
            .with_span(info_span!("extractor")),
        )
    }

    pub fn build_index_use_case(&self) -> Result<BuildIndexUseCase, ContainerError> {
        let chunker = Chunker::new(
            self.config.chunking.chunk_size,
            self.config.chunking.chunk_overlap,
        )?;

        Ok(BuildIndexUseCase::new(
            self.document_extractor(),
            self.embedding_provider.clone(),
            self.index_store.clone(),
            chunker,
        )
        .with_embedding_batch_size(self.config.openai.embedding_batch_size)
        .with_span(info_span!("ingest")))
    }

    /// Loads the persisted index; fails with `IndexNotFound` when ingestion never ran.
    pub fn open_query_pipeline(&self) -> Result<Arc<QueryPipeline>, ContainerError> {
        let pipeline = QueryPipeline::open(
            self.index_store.as_ref(),
            self.embedding_provider.clone(),
            self.generation_provider.clone(),
            &self.config.query,
        )?
        .with_span(info_span!("query"));

        Ok(Arc::new(pipeline))
    }

    pub fn answer_handler(&self) -> Result<Arc<AnswerHandler>, ContainerError> {
        Ok(Arc::new(AnswerHandler::new(
            self.open_query_pipeline()?,
            self.config.server.request_timeout(),
        )))
    }
}
