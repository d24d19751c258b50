use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{Instrument, Span, error, info, info_span, warn};
use uuid::Uuid;

use crate::application::ports::index_store::SourceDocument;
use crate::application::ports::{DocumentExtractor, EmbeddingProvider, ExtractionError, IndexStore};
use crate::application::services::{
    Chunker, ChunkingError, EmbeddingIndex, IndexBuildOptions, IndexError,
};
use crate::domain::value_objects::FileHash;

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("Chunking error: {0}")]
    Chunking(#[from] ChunkingError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Debug, Clone)]
pub struct BuildIndexRequest {
    pub source_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct BuildIndexResponse {
    pub index_id: Uuid,
    pub index_location: PathBuf,
    pub table_units: usize,
    pub page_units: usize,
    pub segments_indexed: usize,
    pub dimension: usize,
    pub processing_time_ms: u64,
}

/// Extract, chunk, embed, save. Each step completes before the next starts,
/// and nothing is written unless every earlier step succeeded.
pub struct BuildIndexUseCase {
    document_extractor: Arc<dyn DocumentExtractor>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    index_store: Arc<dyn IndexStore>,
    chunker: Chunker,
    embedding_batch_size: usize,
    span: Span,
}

impl BuildIndexUseCase {
    pub fn new(
        document_extractor: Arc<dyn DocumentExtractor>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        index_store: Arc<dyn IndexStore>,
        chunker: Chunker,
    ) -> Self {
        Self {
            document_extractor,
            embedding_provider,
            index_store,
            chunker,
            embedding_batch_size: IndexBuildOptions::default().batch_size,
            span: Span::none(),
        }
    }

    pub fn with_embedding_batch_size(mut self, batch_size: usize) -> Self {
        self.embedding_batch_size = batch_size.max(1);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub async fn execute(
        &self,
        request: BuildIndexRequest,
    ) -> Result<BuildIndexResponse, IngestionError> {
        self.run(request).instrument(self.span.clone()).await
    }

    async fn run(&self, request: BuildIndexRequest) -> Result<BuildIndexResponse, IngestionError> {
        let start_time = std::time::Instant::now();
        let source_path = request.source_path;

        info!(source = %source_path.display(), "Starting index build");

        let extractor = self.document_extractor.clone();
        let path = source_path.clone();
        let span = Span::current();
        let units = tokio::task::spawn_blocking(move || span.in_scope(|| extractor.extract(&path)))
            .await
            .map_err(|e| ExtractionError::ExtractionFailed(format!("Extraction task failed: {}", e)))??;

        let table_units = units.iter().filter(|u| u.is_table()).count();
        let page_units = units.len() - table_units;
        info!(table_units, page_units, "Extracted content units");

        let segments = self.chunker.chunk(&units);
        if segments.is_empty() {
            error!("No segments were created. Halting ingestion.");
            return Err(ChunkingError::NoSegments.into());
        }
        info!(
            segments = segments.len(),
            chunk_size = self.chunker.chunk_size(),
            chunk_overlap = self.chunker.chunk_overlap(),
            "Split content into segments"
        );

        let source = match tokio::fs::read(&source_path).await {
            Ok(bytes) => Some(SourceDocument {
                path: source_path.display().to_string(),
                sha256: FileHash::from_bytes(&bytes),
            }),
            Err(e) => {
                warn!(error = %e, "Could not fingerprint source document");
                None
            }
        };

        let options = IndexBuildOptions {
            batch_size: self.embedding_batch_size,
            source,
            span: info_span!(parent: &self.span, "embedding_index"),
        };
        let index = EmbeddingIndex::build(self.embedding_provider.clone(), segments, options)
            .await
            .inspect_err(|e| error!(error = %e, "Embedding failed, no index written"))?;

        index.save(self.index_store.as_ref())?;

        let processing_time_ms = start_time.elapsed().as_millis() as u64;
        info!(
            index_id = %index.manifest().index_id,
            location = %self.index_store.location().display(),
            elapsed_ms = processing_time_ms,
            "Index build finished"
        );

        Ok(BuildIndexResponse {
            index_id: index.manifest().index_id,
            index_location: self.index_store.location().to_path_buf(),
            table_units,
            page_units,
            segments_indexed: index.len(),
            dimension: index.dimension(),
            processing_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ContentUnit;
    use crate::domain::value_objects::Provenance;
    use crate::infrastructure::file_system::LocalIndexStore;
    use crate::test_support::{FailingEmbedder, HashingEmbedder, MemoryIndexStore, StaticExtractor};

    fn units() -> Vec<ContentUnit> {
        vec![
            ContentUnit::new(
                "Additive  INS  Max level\nAspartame  951  2500 mg/kg".to_string(),
                Provenance::table(0, 4),
            )
            .unwrap(),
            ContentUnit::new("Sorbic acid may be used in cheese.".to_string(), Provenance::page(1)).unwrap(),
            ContentUnit::new("x".repeat(250), Provenance::page(2)).unwrap(),
        ]
    }

    fn request() -> BuildIndexRequest {
        BuildIndexRequest {
            source_path: PathBuf::from("does-not-exist.pdf"),
        }
    }

    #[tokio::test]
    async fn test_builds_and_saves_index() {
        let embedder = Arc::new(HashingEmbedder::new(64));
        let store = Arc::new(MemoryIndexStore::new());
        let use_case = BuildIndexUseCase::new(
            Arc::new(StaticExtractor::returning("static", units())),
            embedder.clone(),
            store.clone(),
            Chunker::new(100, 10).unwrap(),
        )
        .with_embedding_batch_size(2);

        let response = use_case.execute(request()).await.unwrap();

        assert_eq!(response.table_units, 1);
        assert_eq!(response.page_units, 2);
        // 1 + 1 + ceil((250 - 100) / 90) + 1
        assert_eq!(response.segments_indexed, 5);
        assert_eq!(response.dimension, 64);
        assert_eq!(embedder.calls(), 3);

        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.manifest.index_id, response.index_id);
        assert_eq!(snapshot.segments.len(), 5);
        assert!(snapshot.segments[0].provenance().is_table());
        assert!(snapshot.manifest.source.is_none());
    }

    #[tokio::test]
    async fn test_zero_segments_aborts_before_embedding() {
        let embedder = Arc::new(HashingEmbedder::new(64));
        let store = Arc::new(MemoryIndexStore::new());
        let use_case = BuildIndexUseCase::new(
            Arc::new(StaticExtractor::returning("static", Vec::new())),
            embedder.clone(),
            store.clone(),
            Chunker::new(100, 10).unwrap(),
        );

        let result = use_case.execute(request()).await;

        assert!(matches!(result, Err(IngestionError::Chunking(ChunkingError::NoSegments))));
        assert_eq!(embedder.calls(), 0);
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn test_extraction_failure_aborts() {
        let store = Arc::new(MemoryIndexStore::new());
        let use_case = BuildIndexUseCase::new(
            Arc::new(StaticExtractor::failing("static", "not a PDF")),
            Arc::new(HashingEmbedder::new(64)),
            store.clone(),
            Chunker::new(100, 10).unwrap(),
        );

        let result = use_case.execute(request()).await;

        assert!(matches!(result, Err(IngestionError::Extraction(_))));
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn test_embedding_failure_leaves_no_index_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("vector_store").join("index");
        let store = Arc::new(LocalIndexStore::new(index_path.clone()));
        let use_case = BuildIndexUseCase::new(
            Arc::new(StaticExtractor::returning("static", units())),
            Arc::new(FailingEmbedder::after_calls(1)),
            store.clone(),
            Chunker::new(100, 10).unwrap(),
        )
        .with_embedding_batch_size(2);

        let result = use_case.execute(request()).await;

        assert!(matches!(
            result,
            Err(IngestionError::Index(IndexError::EmbeddingService(_)))
        ));
        assert!(!store.exists());
        assert!(!index_path.exists());
    }

    #[tokio::test]
    async fn test_fingerprints_readable_source() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("compendium.pdf");
        std::fs::write(&source_path, b"%PDF-1.5 fake bytes").unwrap();
        let store = Arc::new(MemoryIndexStore::new());
        let use_case = BuildIndexUseCase::new(
            Arc::new(StaticExtractor::returning("static", units())),
            Arc::new(HashingEmbedder::new(16)),
            store.clone(),
            Chunker::new(1000, 100).unwrap(),
        );

        use_case
            .execute(BuildIndexRequest {
                source_path: source_path.clone(),
            })
            .await
            .unwrap();

        let source = store.load().unwrap().manifest.source.unwrap();
        assert_eq!(source.sha256, FileHash::from_bytes(b"%PDF-1.5 fake bytes"));
        assert_eq!(source.path, source_path.display().to_string());
    }
}
