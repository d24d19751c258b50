use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::Segment;
use crate::domain::value_objects::FileHash;

pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum IndexStoreError {
    #[error("No persisted index found at {}", .0.display())]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Corrupted index: {0}")]
    Corrupted(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub path: String,
    pub sha256: FileHash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub index_id: Uuid,
    pub built_at: DateTime<Utc>,
    pub embedding_model: String,
    pub dimension: usize,
    pub segment_count: usize,
    pub source: Option<SourceDocument>,
}

/// Everything needed to restore an index: one vector per segment, same order.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSnapshot {
    pub manifest: IndexManifest,
    pub segments: Vec<Segment>,
    pub vectors: Vec<Vec<f32>>,
}

/// Serialization boundary for a built index. A store is bound to one location.
pub trait IndexStore: Send + Sync {
    fn location(&self) -> &Path;

    fn exists(&self) -> bool;

    /// Replaces whatever is persisted at the location, all or nothing.
    fn save(&self, snapshot: &IndexSnapshot) -> Result<(), IndexStoreError>;

    fn load(&self) -> Result<IndexSnapshot, IndexStoreError>;
}
