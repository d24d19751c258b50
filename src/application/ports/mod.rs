pub mod document_extractor;
pub mod embedding_provider;
pub mod generation_provider;
pub mod index_store;

pub use document_extractor::{DocumentExtractor, ExtractionError};
pub use embedding_provider::{EmbeddingProvider, EmbeddingProviderError};
pub use generation_provider::{GenerationProvider, GenerationProviderError};
pub use index_store::{IndexStore, IndexStoreError};
