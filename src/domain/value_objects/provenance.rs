use serde::{Deserialize, Serialize};

/// Where an extracted piece of text came from in the source document.
///
/// Page numbers are 1-based as reported by the PDF page tree. Table indices
/// are zero-based and run across the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    Table { table_index: usize, page_number: u32 },
    Page { page_number: u32 },
}

impl Provenance {
    pub fn table(table_index: usize, page_number: u32) -> Self {
        Provenance::Table {
            table_index,
            page_number,
        }
    }

    pub fn page(page_number: u32) -> Self {
        Provenance::Page { page_number }
    }

    pub fn page_number(&self) -> u32 {
        match self {
            Provenance::Table { page_number, .. } | Provenance::Page { page_number } => {
                *page_number
            }
        }
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Provenance::Table { .. })
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::Table {
                table_index,
                page_number,
            } => write!(f, "table {}, page {}", table_index, page_number),
            Provenance::Page { page_number } => write!(f, "page {}", page_number),
        }
    }
}
