use thiserror::Error;

use crate::domain::entities::{ContentUnit, Segment};

#[derive(Debug, Error)]
pub enum ChunkingError {
    #[error(
        "Invalid chunking parameters: chunk size {chunk_size}, overlap {chunk_overlap} (need 0 <= overlap < chunk size)"
    )]
    InvalidParameters {
        chunk_size: usize,
        chunk_overlap: usize,
    },
    #[error("Chunking produced no segments")]
    NoSegments,
}

/// A window of a unit's text, positions counted in characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextWindow {
    pub text: String,
    pub char_offset: usize,
    pub overlap: usize,
}

/// Fixed-size sliding-window chunker.
///
/// Units are chunked independently so a segment never mixes provenance.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkingError> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(ChunkingError::InvalidParameters {
                chunk_size,
                chunk_overlap,
            });
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }

    pub fn split_text(&self, text: &str) -> Vec<TextWindow> {
        // Byte offset of every char boundary, plus the end of the string.
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_len = boundaries.len() - 1;

        let mut windows = Vec::new();
        if char_len == 0 {
            return windows;
        }

        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(char_len);

            windows.push(TextWindow {
                text: text[boundaries[start]..boundaries[end]].to_string(),
                char_offset: start,
                overlap: if start == 0 { 0 } else { self.chunk_overlap },
            });

            if end == char_len {
                break;
            }

            start += self.stride();
        }

        windows
    }

    /// Splits every unit in order; segment ordinals run across the whole document.
    pub fn chunk(&self, units: &[ContentUnit]) -> Vec<Segment> {
        let mut segments = Vec::new();

        for unit in units {
            for window in self.split_text(unit.text()) {
                segments.push(Segment::new(
                    segments.len(),
                    window.text,
                    unit.provenance().clone(),
                    window.char_offset,
                    window.overlap,
                ));
            }
        }

        segments
    }
}
