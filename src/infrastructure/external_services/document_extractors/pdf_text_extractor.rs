use std::path::Path;

use lopdf::{Document, Object};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, warn};

use crate::application::ports::document_extractor::{DocumentExtractor, ExtractionError};
use crate::domain::entities::ContentUnit;
use crate::domain::value_objects::Provenance;

/// Opens a PDF the way every extractor here does: metadata and annotation
/// objects stripped on load, decrypted with the empty user password when needed.
pub fn load_document(path: &Path) -> Result<Document, ExtractionError> {
    if !path.exists() {
        return Err(ExtractionError::Io(format!(
            "Source document not found: {}",
            path.display()
        )));
    }

    let mut doc = Document::load_filtered(path, filter_func)
        .map_err(|e| ExtractionError::CorruptedFile(e.to_string()))?;

    if doc.is_encrypted() {
        doc.decrypt("").map_err(|e| {
            ExtractionError::ExtractionFailed(format!("Failed to decrypt PDF: {}", e))
        })?;
    }

    Ok(doc)
}

fn filter_func(object_id: (u32, u16), object: &mut Object) -> Option<((u32, u16), Object)> {
    static IGNORE_TYPES: &[&[u8]] = &[b"Annot", b"Metadata", b"XObject"];
    static IGNORE_KEYS: &[&[u8]] = &[
        b"Annots",
        b"Creator",
        b"ModDate",
        b"Producer",
        b"PTEX.FileName",
        b"PTEX.InfoDict",
        b"PTEX.PageNumber",
    ];

    if let Ok(type_name) = object.type_name() {
        if IGNORE_TYPES.contains(&type_name) {
            return None;
        }
    }

    if let Object::Dictionary(dict) = object {
        let keys_to_remove: Vec<_> = dict
            .iter()
            .filter_map(|(key, _)| {
                if IGNORE_KEYS.contains(&key.as_slice()) {
                    Some(key.clone())
                } else {
                    None
                }
            })
            .collect();
        for key in keys_to_remove {
            dict.remove(&key);
        }
    }

    Some((object_id, object.to_owned()))
}

/// Plain text, one unit per non-empty page.
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extract_pages(&self, doc: &Document) -> Result<Vec<ContentUnit>, ExtractionError> {
        let pages = doc.get_pages();
        let page_count = pages.len();

        let extracted_pages: Vec<Result<(u32, String), String>> = pages
            .into_par_iter()
            .map(|(page_num, _): (u32, (u32, u16))| -> Result<(u32, String), String> {
                let text = doc
                    .extract_text(&[page_num])
                    .map_err(|e| format!("Failed to extract text from page {}: {}", page_num, e))?;

                let lines: Vec<&str> = text
                    .split('\n')
                    .map(|s| s.trim_end())
                    .filter(|s| !s.trim().is_empty())
                    .collect();

                Ok((page_num, lines.join("\n")))
            })
            .collect();

        let mut units = Vec::new();
        let mut failures = 0;

        for page_result in extracted_pages {
            match page_result {
                Ok((page_num, text)) => {
                    if let Some(unit) = ContentUnit::new(text, Provenance::page(page_num)) {
                        units.push(unit);
                    } else {
                        debug!(page = page_num, "Page has no text");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Skipping page");
                    failures += 1;
                }
            }
        }

        if page_count > 0 && failures == page_count {
            return Err(ExtractionError::ExtractionFailed(format!(
                "Text extraction failed on all {} pages",
                page_count
            )));
        }

        Ok(units)
    }
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentExtractor for PdfTextExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<ContentUnit>, ExtractionError> {
        let doc = load_document(path)?;
        self.extract_pages(&doc)
    }

    fn name(&self) -> &'static str {
        "pdf-text"
    }
}
