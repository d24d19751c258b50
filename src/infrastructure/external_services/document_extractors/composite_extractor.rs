use std::path::Path;
use std::sync::Arc;

use tracing::{Span, info, warn};

use super::{PdfTableExtractor, PdfTextExtractor};
use crate::application::ports::document_extractor::{DocumentExtractor, ExtractionError};
use crate::domain::entities::ContentUnit;

/// Runs the table method and the text method side by side and merges their
/// output: tables first, then pages. One method failing only costs its share.
pub struct CompositeExtractor {
    table_extractor: Arc<dyn DocumentExtractor>,
    text_extractor: Arc<dyn DocumentExtractor>,
    span: Span,
}

impl CompositeExtractor {
    pub fn new(
        table_extractor: Arc<dyn DocumentExtractor>,
        text_extractor: Arc<dyn DocumentExtractor>,
    ) -> Self {
        Self {
            table_extractor,
            text_extractor,
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    fn run_method(&self, extractor: &dyn DocumentExtractor, path: &Path) -> Vec<ContentUnit> {
        self.span.in_scope(|| match extractor.extract(path) {
            Ok(units) => units,
            Err(e) => {
                warn!(method = extractor.name(), error = %e, "Extraction method failed");
                Vec::new()
            }
        })
    }
}

impl Default for CompositeExtractor {
    fn default() -> Self {
        Self::new(
            Arc::new(PdfTableExtractor::new()),
            Arc::new(PdfTextExtractor::new()),
        )
    }
}

impl DocumentExtractor for CompositeExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<ContentUnit>, ExtractionError> {
        let (tables, pages) = rayon::join(
            || self.run_method(self.table_extractor.as_ref(), path),
            || self.run_method(self.text_extractor.as_ref(), path),
        );

        if tables.is_empty() && pages.is_empty() {
            return Err(ExtractionError::NothingExtracted(format!(
                "Neither tables nor page text could be extracted from {}",
                path.display()
            )));
        }

        self.span.in_scope(|| {
            info!(
                tables = tables.len(),
                pages = pages.len(),
                source = %path.display(),
                "Extracted document"
            )
        });

        let mut units = tables;
        units.extend(pages);
        Ok(units)
    }

    fn name(&self) -> &'static str {
        "composite"
    }
}
