pub mod chunker;
pub mod embedding_index;
pub mod prompt_builder;

pub use chunker::{Chunker, ChunkingError};
pub use embedding_index::{EmbeddingIndex, IndexBuildOptions, IndexError};
pub use prompt_builder::PromptBuilder;
