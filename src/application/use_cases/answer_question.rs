use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{Instrument, Span, debug, info, warn};

use crate::application::ports::generation_provider::GenerationRequest;
use crate::application::ports::{
    EmbeddingProvider, GenerationProvider, GenerationProviderError, IndexStore,
};
use crate::application::services::prompt_builder::DEFAULT_SYSTEM_INSTRUCTION;
use crate::application::services::{EmbeddingIndex, IndexError, PromptBuilder};
use crate::domain::entities::{Prompt, RetrievedContext};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("No index found at {}; run ingestion first", .0.display())]
    IndexNotFound(PathBuf),
    #[error("Index could not be loaded: {0}")]
    IndexUnavailable(String),
    #[error("Embedding service error: {0}")]
    EmbeddingService(String),
    #[error("Generation service error: {0}")]
    GenerationService(String),
}

impl From<IndexError> for QueryError {
    fn from(error: IndexError) -> Self {
        match error {
            IndexError::NotFound(path) => QueryError::IndexNotFound(path),
            IndexError::EmbeddingService(e) => QueryError::EmbeddingService(e.to_string()),
            IndexError::InvalidTopK => {
                QueryError::InvalidQuery("top_k must be at least 1".to_string())
            }
            IndexError::Persistence(msg) => QueryError::IndexUnavailable(msg),
        }
    }
}

impl From<GenerationProviderError> for QueryError {
    fn from(error: GenerationProviderError) -> Self {
        QueryError::GenerationService(error.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct QuerySettings {
    pub top_k: usize,
    pub temperature: f32,
    pub system_instruction: String,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            top_k: 4,
            temperature: 0.7,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

/// An answer together with what it was generated from.
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    pub answer: String,
    pub context: RetrievedContext,
    pub prompt: Prompt,
}

/// Question in, grounded answer out.
///
/// Holds no per-query state, so one pipeline serves any number of concurrent
/// questions behind an `Arc`.
pub struct QueryPipeline {
    index: Arc<EmbeddingIndex>,
    generation_provider: Arc<dyn GenerationProvider>,
    prompt_builder: PromptBuilder,
    top_k: usize,
    temperature: f32,
    span: Span,
}

impl QueryPipeline {
    pub fn new(
        index: Arc<EmbeddingIndex>,
        generation_provider: Arc<dyn GenerationProvider>,
        settings: &QuerySettings,
    ) -> Result<Self, QueryError> {
        if settings.top_k == 0 {
            return Err(QueryError::InvalidQuery(
                "top_k must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            index,
            generation_provider,
            prompt_builder: PromptBuilder::new(settings.system_instruction.clone()),
            top_k: settings.top_k,
            temperature: settings.temperature,
            span: Span::none(),
        })
    }

    /// Loads the persisted index. Fails with [`QueryError::IndexNotFound`]
    /// before any question is taken if ingestion never ran.
    pub fn open(
        store: &dyn IndexStore,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        generation_provider: Arc<dyn GenerationProvider>,
        settings: &QuerySettings,
    ) -> Result<Self, QueryError> {
        let index = EmbeddingIndex::load(embedding_provider, store)?;
        info!(
            index_id = %index.manifest().index_id,
            segments = index.len(),
            location = %store.location().display(),
            "Loaded embedding index"
        );

        Self::new(Arc::new(index), generation_provider, settings)
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    pub async fn answer(&self, question: &str) -> Result<String, QueryError> {
        Ok(self.answer_with_sources(question).await?.answer)
    }

    pub async fn answer_with_sources(&self, question: &str) -> Result<AnswerOutcome, QueryError> {
        self.run(question).instrument(self.span.clone()).await
    }

    async fn run(&self, question: &str) -> Result<AnswerOutcome, QueryError> {
        if question.trim().is_empty() {
            return Err(QueryError::InvalidQuery(
                "Question cannot be empty".to_string(),
            ));
        }

        let context = self.retrieve(question).await?;
        debug!(passages = context.len(), "Retrieved context");

        let prompt = self.prompt_builder.build(question, &context);
        debug!(prompt = %prompt.render(), "Assembled prompt");
        let request = GenerationRequest {
            messages: prompt.to_messages(),
            temperature: self.temperature,
        };

        let response = self
            .generation_provider
            .generate(request)
            .await
            .inspect_err(|e| warn!(error = %e, "Generation failed"))?;

        info!(
            passages = context.len(),
            model = %response.model_name,
            "Answered question"
        );

        Ok(AnswerOutcome {
            answer: response.text,
            context,
            prompt,
        })
    }

    async fn retrieve(&self, question: &str) -> Result<RetrievedContext, QueryError> {
        if self.index.is_empty() {
            warn!("Index is empty, answering without context");
            return Ok(RetrievedContext::empty());
        }

        let passages = self.index.search(question, self.top_k).await?;
        Ok(RetrievedContext::new(passages))
    }
}
