use std::path::Path;

use thiserror::Error;

use crate::domain::entities::ContentUnit;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Corrupted file: {0}")]
    CorruptedFile(String),
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("No content could be extracted from {0}")]
    NothingExtracted(String),
}

/// Pulls content units out of a source document.
///
/// Output must follow document order within the extractor's own kind of
/// content. Extraction is CPU-bound and synchronous.
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Vec<ContentUnit>, ExtractionError>;

    fn name(&self) -> &'static str;
}
