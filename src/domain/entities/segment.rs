use serde::{Deserialize, Serialize};

use crate::domain::value_objects::Provenance;

/// A bounded slice of one content unit's text; the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    ordinal: usize,
    text: String,
    provenance: Provenance,
    char_offset: usize,
    overlap: usize,
}

impl Segment {
    pub fn new(
        ordinal: usize,
        text: String,
        provenance: Provenance,
        char_offset: usize,
        overlap: usize,
    ) -> Self {
        Self {
            ordinal,
            text,
            provenance,
            char_offset,
            overlap,
        }
    }

    /// Position of this segment in document order across the whole index.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Offset, in characters, of the first character within the source unit.
    pub fn char_offset(&self) -> usize {
        self.char_offset
    }

    /// Number of leading characters shared with the previous segment of the same unit.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}
