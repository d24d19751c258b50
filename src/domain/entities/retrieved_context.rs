use serde::Serialize;

use crate::domain::entities::Segment;

pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredSegment {
    pub segment: Segment,
    pub score: f32,
}

/// Segments retrieved for one question, best match first.
///
/// Overlapping or near-duplicate segments are kept as retrieved.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievedContext {
    passages: Vec<ScoredSegment>,
}

impl RetrievedContext {
    pub fn new(passages: Vec<ScoredSegment>) -> Self {
        Self { passages }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn passages(&self) -> &[ScoredSegment] {
        &self.passages
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Joins the passages in ranked order. Each passage is prefixed with its
    /// provenance and keeps its text verbatim.
    pub fn to_context_block(&self) -> String {
        self.passages
            .iter()
            .map(|p| format!("[{}]\n{}", p.segment.provenance(), p.segment.text()))
            .collect::<Vec<_>>()
            .join(CONTEXT_DELIMITER)
    }
}
