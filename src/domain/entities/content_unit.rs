use serde::{Deserialize, Serialize};

use crate::domain::value_objects::Provenance;

/// One atomic piece of extracted content: a rendered table or one page of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentUnit {
    text: String,
    provenance: Provenance,
}

impl ContentUnit {
    /// Returns `None` for blank content; blank units are never indexed.
    pub fn new(text: String, provenance: Provenance) -> Option<Self> {
        if text.trim().is_empty() {
            return None;
        }

        Some(Self { text, provenance })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_table(&self) -> bool {
        self.provenance.is_table()
    }
}
