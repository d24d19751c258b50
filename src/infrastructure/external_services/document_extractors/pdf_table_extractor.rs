use std::path::Path;

use lopdf::Document;
use lopdf::content::Content;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, warn};

use super::layout::{LayoutOptions, Table, detect_tables, group_rows, text_runs};
use super::pdf_text_extractor::load_document;
use crate::application::ports::document_extractor::{DocumentExtractor, ExtractionError};
use crate::domain::entities::ContentUnit;
use crate::domain::value_objects::Provenance;

/// Tables found by layout analysis, one unit per table, numbered across the document.
pub struct PdfTableExtractor {
    options: LayoutOptions,
}

impl PdfTableExtractor {
    pub fn new() -> Self {
        Self::with_options(LayoutOptions::default())
    }

    pub fn with_options(options: LayoutOptions) -> Self {
        Self { options }
    }

    fn page_tables(&self, doc: &Document, page_id: (u32, u16)) -> Result<Vec<Table>, String> {
        let bytes = doc
            .get_page_content(page_id)
            .map_err(|e| format!("Failed to read content stream: {}", e))?;
        let content =
            Content::decode(&bytes).map_err(|e| format!("Failed to decode content stream: {}", e))?;

        let rows = group_rows(&text_runs(&content), &self.options);
        Ok(detect_tables(&rows, &self.options))
    }
}

impl Default for PdfTableExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentExtractor for PdfTableExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<ContentUnit>, ExtractionError> {
        let doc = load_document(path)?;
        let pages = doc.get_pages();
        let page_count = pages.len();

        let mut extracted_pages: Vec<(u32, Result<Vec<Table>, String>)> = pages
            .into_par_iter()
            .map(|(page_num, page_id)| (page_num, self.page_tables(&doc, page_id)))
            .collect();
        extracted_pages.sort_by_key(|(page_num, _)| *page_num);

        let mut units = Vec::new();
        let mut failures = 0;

        for (page_num, result) in extracted_pages {
            match result {
                Ok(tables) => {
                    if !tables.is_empty() {
                        debug!(page = page_num, tables = tables.len(), "Found tables");
                    }
                    for table in tables {
                        let provenance = Provenance::table(units.len(), page_num);
                        if let Some(unit) = ContentUnit::new(table.render(), provenance) {
                            units.push(unit);
                        }
                    }
                }
                Err(e) => {
                    warn!(page = page_num, error = %e, "Skipping page during table detection");
                    failures += 1;
                }
            }
        }

        if page_count > 0 && failures == page_count {
            return Err(ExtractionError::ExtractionFailed(format!(
                "Table detection failed on all {} pages",
                page_count
            )));
        }

        Ok(units)
    }

    fn name(&self) -> &'static str {
        "pdf-tables"
    }
}
