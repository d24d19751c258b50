use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{Instrument, Span, debug, info, warn};
use uuid::Uuid;

use crate::application::ports::embedding_provider::{
    BatchEmbeddingRequest, EmbeddingProvider, EmbeddingProviderError,
};
use crate::application::ports::index_store::{
    INDEX_FORMAT_VERSION, IndexManifest, IndexSnapshot, IndexStore, IndexStoreError,
    SourceDocument,
};
use crate::domain::entities::{ScoredSegment, Segment};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Embedding service error: {0}")]
    EmbeddingService(#[from] EmbeddingProviderError),
    #[error("No persisted index found at {}", .0.display())]
    NotFound(PathBuf),
    #[error("Index persistence error: {0}")]
    Persistence(String),
    #[error("Top-k must be at least 1")]
    InvalidTopK,
}

impl From<IndexStoreError> for IndexError {
    fn from(error: IndexStoreError) -> Self {
        match error {
            IndexStoreError::NotFound(path) => IndexError::NotFound(path),
            other => IndexError::Persistence(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexBuildOptions {
    pub batch_size: usize,
    pub source: Option<SourceDocument>,
    pub span: Span,
}

impl Default for IndexBuildOptions {
    fn default() -> Self {
        Self {
            batch_size: 64,
            source: None,
            span: Span::none(),
        }
    }
}

/// Segments plus one embedding vector each, searchable by cosine similarity.
///
/// Immutable once built or loaded; concurrent searches share it without locking.
pub struct EmbeddingIndex {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    manifest: IndexManifest,
    segments: Vec<Segment>,
    vectors: Vec<Vec<f32>>,
    norms: Vec<f32>,
}

fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine_similarity(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot_product / (norm_a * norm_b)
}

impl EmbeddingIndex {
    /// Embeds every segment and builds the index in memory.
    ///
    /// Nothing is persisted here; any embedding failure fails the whole build.
    pub async fn build(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        segments: Vec<Segment>,
        options: IndexBuildOptions,
    ) -> Result<Self, IndexError> {
        let span = options.span.clone();
        Self::embed_all(embedding_provider, segments, options)
            .instrument(span)
            .await
    }

    async fn embed_all(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        segments: Vec<Segment>,
        options: IndexBuildOptions,
    ) -> Result<Self, IndexError> {
        let batch_size = options.batch_size.max(1);
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(segments.len());

        for (batch_number, batch) in segments.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|s| s.text().to_string()).collect();

            let response = embedding_provider
                .generate_embeddings(BatchEmbeddingRequest { texts })
                .await?;

            if response.embeddings.len() != batch.len() {
                return Err(EmbeddingProviderError::InvalidResponse(format!(
                    "Requested {} embeddings, received {}",
                    batch.len(),
                    response.embeddings.len()
                ))
                .into());
            }

            vectors.extend(response.embeddings);
            debug!(
                batch = batch_number,
                embedded = vectors.len(),
                total = segments.len(),
                "Embedded batch"
            );
        }

        let dimension = vectors.first().map_or(0, Vec::len);
        if !vectors.is_empty() && dimension == 0 {
            return Err(EmbeddingProviderError::InvalidResponse(
                "Embedding service returned empty vectors".to_string(),
            )
            .into());
        }
        if let Some(position) = vectors.iter().position(|v| v.len() != dimension) {
            return Err(EmbeddingProviderError::InvalidResponse(format!(
                "Segment {} has dimension {}, expected {}",
                position,
                vectors[position].len(),
                dimension
            ))
            .into());
        }

        let manifest = IndexManifest {
            format_version: INDEX_FORMAT_VERSION,
            index_id: Uuid::new_v4(),
            built_at: Utc::now(),
            embedding_model: embedding_provider.model_name().to_string(),
            dimension,
            segment_count: segments.len(),
            source: options.source,
        };

        info!(
            index_id = %manifest.index_id,
            segments = segments.len(),
            dimension,
            "Built embedding index"
        );

        Ok(Self::from_parts(embedding_provider, manifest, segments, vectors))
    }

    fn from_parts(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        manifest: IndexManifest,
        segments: Vec<Segment>,
        vectors: Vec<Vec<f32>>,
    ) -> Self {
        let norms = vectors.iter().map(|v| l2_norm(v)).collect();

        Self {
            embedding_provider,
            manifest,
            segments,
            vectors,
            norms,
        }
    }

    /// Restores a persisted index. Fails with [`IndexError::NotFound`] when
    /// nothing has been saved at the store's location.
    pub fn load(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        store: &dyn IndexStore,
    ) -> Result<Self, IndexError> {
        let snapshot = store.load()?;
        Self::from_snapshot(embedding_provider, snapshot)
    }

    pub fn from_snapshot(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        snapshot: IndexSnapshot,
    ) -> Result<Self, IndexError> {
        let IndexSnapshot {
            manifest,
            segments,
            vectors,
        } = snapshot;

        if segments.len() != manifest.segment_count || vectors.len() != manifest.segment_count {
            return Err(IndexError::Persistence(format!(
                "Manifest lists {} segments, found {} segments and {} vectors",
                manifest.segment_count,
                segments.len(),
                vectors.len()
            )));
        }
        if vectors.iter().any(|v| v.len() != manifest.dimension) {
            return Err(IndexError::Persistence(format!(
                "Vectors do not match the manifest dimension {}",
                manifest.dimension
            )));
        }
        if manifest.embedding_model != embedding_provider.model_name() {
            warn!(
                index_model = %manifest.embedding_model,
                query_model = %embedding_provider.model_name(),
                "Index was built with a different embedding model"
            );
        }

        Ok(Self::from_parts(embedding_provider, manifest, segments, vectors))
    }

    pub fn to_snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            manifest: self.manifest.clone(),
            segments: self.segments.clone(),
            vectors: self.vectors.clone(),
        }
    }

    pub fn save(&self, store: &dyn IndexStore) -> Result<(), IndexError> {
        store.save(&self.to_snapshot())?;
        info!(
            index_id = %self.manifest.index_id,
            location = %store.location().display(),
            "Saved embedding index"
        );
        Ok(())
    }

    /// Embeds `query` and returns at most `k` segments, best first.
    ///
    /// Equal scores keep document order. An empty index answers without
    /// calling the embedding service.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredSegment>, IndexError> {
        if k == 0 {
            return Err(IndexError::InvalidTopK);
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedding_provider.generate_embedding(query).await?;
        self.search_by_vector(&query_vector, k)
    }

    pub fn search_by_vector(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredSegment>, IndexError> {
        if k == 0 {
            return Err(IndexError::InvalidTopK);
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if query_vector.len() != self.manifest.dimension {
            return Err(EmbeddingProviderError::InvalidResponse(format!(
                "Query vector has dimension {}, index has {}",
                query_vector.len(),
                self.manifest.dimension
            ))
            .into());
        }

        let query_norm = l2_norm(query_vector);
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .par_iter()
            .zip(self.norms.par_iter())
            .enumerate()
            .map(|(position, (vector, norm))| {
                (
                    position,
                    cosine_similarity(vector, *norm, query_vector, query_norm),
                )
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| ScoredSegment {
                segment: self.segments[position].clone(),
                score,
            })
            .collect())
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.manifest.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Provenance;
    use crate::test_support::{FailingEmbedder, HashingEmbedder, MemoryIndexStore};

    fn segments(texts: &[&str]) -> Vec<Segment> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| Segment::new(i, text.to_string(), Provenance::page(i as u32 + 1), 0, 0))
            .collect()
    }

    fn corpus() -> Vec<Segment> {
        segments(&[
            "Sorbic acid may be used in cheese and bakery wares",
            "Aspartame is permitted up to 2500 mg/kg in category X",
            "Ponceau 4R is a synthetic colour for confectionery",
            "Benzoic acid preserves fruit juices and squashes",
            "Sucralose sweetens carbonated beverages",
        ])
    }

    #[tokio::test]
    async fn test_build_embeds_every_segment_in_batches() {
        let embedder = Arc::new(HashingEmbedder::new(128));
        let options = IndexBuildOptions {
            batch_size: 2,
            ..IndexBuildOptions::default()
        };

        let index = EmbeddingIndex::build(embedder.clone(), corpus(), options)
            .await
            .unwrap();

        assert_eq!(index.len(), 5);
        assert_eq!(index.dimension(), 128);
        assert_eq!(index.vectors().len(), 5);
        assert_eq!(embedder.calls(), 3);
        assert_eq!(index.manifest().embedding_model, "hashing-test");
    }

    #[tokio::test]
    async fn test_search_ranks_best_match_first() {
        let index = EmbeddingIndex::build(
            Arc::new(HashingEmbedder::new(256)),
            corpus(),
            IndexBuildOptions::default(),
        )
        .await
        .unwrap();

        let results = index
            .search("What is the limit for Aspartame in category X?", 3)
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].segment.ordinal(), 1);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_search_never_exceeds_k_or_corpus() {
        let index = EmbeddingIndex::build(
            Arc::new(HashingEmbedder::new(64)),
            corpus(),
            IndexBuildOptions::default(),
        )
        .await
        .unwrap();

        for k in 1..=8 {
            let results = index.search("acid", k).await.unwrap();
            assert_eq!(results.len(), k.min(5));
        }

        assert!(matches!(
            index.search("acid", 0).await,
            Err(IndexError::InvalidTopK)
        ));
    }

    #[tokio::test]
    async fn test_ties_keep_document_order() {
        let index = EmbeddingIndex::build(
            Arc::new(HashingEmbedder::new(64)),
            segments(&["unrelated words here", "same text", "same text", "same text"]),
            IndexBuildOptions::default(),
        )
        .await
        .unwrap();

        let results = index.search("same text", 3).await.unwrap();
        let ordinals: Vec<usize> = results.iter().map(|r| r.segment.ordinal()).collect();

        assert_eq!(ordinals, vec![1, 2, 3]);
        assert_eq!(results[0].score, results[2].score);
    }

    #[tokio::test]
    async fn test_empty_index_skips_embedding() {
        let embedder = Arc::new(HashingEmbedder::new(32));
        let index = EmbeddingIndex::build(embedder.clone(), Vec::new(), IndexBuildOptions::default())
            .await
            .unwrap();

        assert!(index.is_empty());
        assert_eq!(index.dimension(), 0);
        assert!(index.search("anything", 4).await.unwrap().is_empty());
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_fails_build() {
        let embedder = Arc::new(FailingEmbedder::after_calls(1));
        let options = IndexBuildOptions {
            batch_size: 2,
            ..IndexBuildOptions::default()
        };

        let result = EmbeddingIndex::build(embedder, corpus(), options).await;

        assert!(matches!(result, Err(IndexError::EmbeddingService(_))));
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_preserves_results() {
        let embedder = Arc::new(HashingEmbedder::new(128));
        let built = EmbeddingIndex::build(embedder.clone(), corpus(), IndexBuildOptions::default())
            .await
            .unwrap();

        let store = MemoryIndexStore::new();
        built.save(&store).unwrap();
        let loaded = EmbeddingIndex::load(embedder, &store).unwrap();

        assert_eq!(loaded.segments(), built.segments());
        assert_eq!(loaded.vectors(), built.vectors());
        for query in ["aspartame limit", "fruit juice preservative", "colour"] {
            assert_eq!(
                loaded.search(query, 4).await.unwrap(),
                built.search(query, 4).await.unwrap()
            );
        }
    }

    #[test]
    fn test_load_reports_missing_index() {
        let store = MemoryIndexStore::new();
        let result = EmbeddingIndex::load(Arc::new(HashingEmbedder::new(8)), &store);

        assert!(matches!(result, Err(IndexError::NotFound(_))));
    }

    #[test]
    fn test_rejects_inconsistent_snapshot() {
        let snapshot = IndexSnapshot {
            manifest: IndexManifest {
                format_version: INDEX_FORMAT_VERSION,
                index_id: Uuid::new_v4(),
                built_at: Utc::now(),
                embedding_model: "hashing-test".to_string(),
                dimension: 3,
                segment_count: 1,
                source: None,
            },
            segments: segments(&["one"]),
            vectors: vec![vec![1.0, 0.0]],
        };

        let result = EmbeddingIndex::from_snapshot(Arc::new(HashingEmbedder::new(3)), snapshot);
        assert!(matches!(result, Err(IndexError::Persistence(_))));
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let snapshot = IndexSnapshot {
            manifest: IndexManifest {
                format_version: INDEX_FORMAT_VERSION,
                index_id: Uuid::new_v4(),
                built_at: Utc::now(),
                embedding_model: "hashing-test".to_string(),
                dimension: 2,
                segment_count: 1,
                source: None,
            },
            segments: segments(&["one"]),
            vectors: vec![vec![1.0, 0.0]],
        };
        let index = EmbeddingIndex::from_snapshot(Arc::new(HashingEmbedder::new(2)), snapshot).unwrap();

        assert!(matches!(
            index.search_by_vector(&[1.0, 0.0, 0.0], 1),
            Err(IndexError::EmbeddingService(_))
        ));
        assert_eq!(index.search_by_vector(&[1.0, 0.0], 1).unwrap()[0].score, 1.0);
    }
}
