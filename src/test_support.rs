//! Deterministic stand-ins for the external services, shared by unit tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::application::ports::document_extractor::{DocumentExtractor, ExtractionError};
use crate::application::ports::embedding_provider::{
    BatchEmbeddingRequest, BatchEmbeddingResponse, EmbeddingProvider, EmbeddingProviderError,
};
use crate::application::ports::generation_provider::{
    GenerationProvider, GenerationProviderError, GenerationRequest, GenerationResponse,
};
use crate::application::ports::index_store::{IndexSnapshot, IndexStore, IndexStoreError};
use crate::domain::entities::ContentUnit;

fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in token.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Bag-of-words embedder: lowercase alphanumeric tokens hashed into buckets.
pub struct HashingEmbedder {
    dimension: usize,
    calls: AtomicUsize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a(&token.to_lowercase()) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn generate_embeddings(
        &self,
        request: BatchEmbeddingRequest,
    ) -> Result<BatchEmbeddingResponse, EmbeddingProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        Ok(BatchEmbeddingResponse {
            embeddings: request.texts.iter().map(|t| self.embed_text(t)).collect(),
            model_name: "hashing-test".to_string(),
            total_tokens: None,
        })
    }

    fn model_name(&self) -> &str {
        "hashing-test"
    }
}

/// Succeeds for the first `succeed_calls` batches, then fails every call.
pub struct FailingEmbedder {
    inner: HashingEmbedder,
    succeed_calls: usize,
}

impl FailingEmbedder {
    pub fn after_calls(succeed_calls: usize) -> Self {
        Self {
            inner: HashingEmbedder::new(16),
            succeed_calls,
        }
    }

    pub fn always() -> Self {
        Self::after_calls(0)
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn generate_embeddings(
        &self,
        request: BatchEmbeddingRequest,
    ) -> Result<BatchEmbeddingResponse, EmbeddingProviderError> {
        if self.inner.calls() >= self.succeed_calls {
            return Err(EmbeddingProviderError::NetworkError(
                "connection refused".to_string(),
            ));
        }
        self.inner.generate_embeddings(request).await
    }

    fn model_name(&self) -> &str {
        "hashing-test"
    }
}

/// Records every request and answers with a fixed reply, or fails.
pub struct RecordingGenerator {
    reply: String,
    fail_first: usize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl RecordingGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            fail_first: 0,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::failing_first(usize::MAX, "")
    }

    /// Fails the first `calls` requests, then replies normally.
    pub fn failing_first(calls: usize, reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            fail_first: calls,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationProvider for RecordingGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationProviderError> {
        let call_number = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };

        if call_number <= self.fail_first {
            return Err(GenerationProviderError::ApiError(
                "503 Service Unavailable".to_string(),
            ));
        }

        Ok(GenerationResponse {
            text: self.reply.clone(),
            model_name: "recording-test".to_string(),
            finish_reason: Some("stop".to_string()),
        })
    }

    fn model_name(&self) -> &str {
        "recording-test"
    }
}

/// Replies with the user message it was sent, so callers can tell answers apart.
pub struct EchoGenerator;

#[async_trait]
impl GenerationProvider for EchoGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationProviderError> {
        tokio::task::yield_now().await;
        let text = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        Ok(GenerationResponse {
            text,
            model_name: "echo-test".to_string(),
            finish_reason: None,
        })
    }

    fn model_name(&self) -> &str {
        "echo-test"
    }
}

pub struct MemoryIndexStore {
    location: PathBuf,
    snapshot: Mutex<Option<IndexSnapshot>>,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self {
            location: PathBuf::from("memory://index"),
            snapshot: Mutex::new(None),
        }
    }
}

impl IndexStore for MemoryIndexStore {
    fn location(&self) -> &Path {
        &self.location
    }

    fn exists(&self) -> bool {
        self.snapshot.lock().unwrap().is_some()
    }

    fn save(&self, snapshot: &IndexSnapshot) -> Result<(), IndexStoreError> {
        *self.snapshot.lock().unwrap() = Some(snapshot.clone());
        Ok(())
    }

    fn load(&self) -> Result<IndexSnapshot, IndexStoreError> {
        self.snapshot
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| IndexStoreError::NotFound(self.location.clone()))
    }
}

/// Returns fixed units, or fails, regardless of the path.
pub struct StaticExtractor {
    name: &'static str,
    result: Result<Vec<ContentUnit>, String>,
    calls: AtomicUsize,
}

impl StaticExtractor {
    pub fn returning(name: &'static str, units: Vec<ContentUnit>) -> Self {
        Self {
            name,
            result: Ok(units),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &'static str, message: &str) -> Self {
        Self {
            name,
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DocumentExtractor for StaticExtractor {
    fn extract(&self, _path: &Path) -> Result<Vec<ContentUnit>, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .clone()
            .map_err(ExtractionError::CorruptedFile)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
