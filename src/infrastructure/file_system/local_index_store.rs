use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::ports::index_store::{
    INDEX_FORMAT_VERSION, IndexManifest, IndexSnapshot, IndexStore, IndexStoreError,
};
use crate::domain::entities::Segment;

const MANIFEST_FILE: &str = "manifest.json";
const SEGMENTS_FILE: &str = "segments.json";
const VECTORS_FILE: &str = "vectors.bin";

/// Persists an index as a directory: `manifest.json`, `segments.json` and
/// `vectors.bin` (row-major little-endian `f32`).
pub struct LocalIndexStore {
    base_path: PathBuf,
}

fn io_error(context: &str, path: &Path, error: std::io::Error) -> IndexStoreError {
    IndexStoreError::Io(format!("{} {}: {}", context, path.display(), error))
}

fn encode_vectors(vectors: &[Vec<f32>]) -> Vec<u8> {
    vectors
        .iter()
        .flat_map(|vector| vector.iter().flat_map(|x| x.to_le_bytes()))
        .collect()
}

fn decode_vectors(bytes: &[u8], count: usize, dimension: usize) -> Result<Vec<Vec<f32>>, IndexStoreError> {
    let expected = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| {
            IndexStoreError::Corrupted(format!(
                "Manifest size {} x {} is out of range",
                count, dimension
            ))
        })?;
    if bytes.len() != expected {
        return Err(IndexStoreError::Corrupted(format!(
            "{} holds {} bytes, expected {} for {} vectors of dimension {}",
            VECTORS_FILE,
            bytes.len(),
            expected,
            count,
            dimension
        )));
    }
    if dimension == 0 {
        return Ok(vec![Vec::new(); count]);
    }

    Ok(bytes
        .chunks_exact(dimension * 4)
        .map(|row| {
            row.chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect()
        })
        .collect())
}

impl LocalIndexStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn sibling(&self, tag: &str) -> PathBuf {
        let name = self
            .base_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "index".to_string());
        self.base_path
            .with_file_name(format!(".{}.{}-{}", name, tag, Uuid::new_v4()))
    }

    fn write_files(&self, dir: &Path, snapshot: &IndexSnapshot) -> Result<(), IndexStoreError> {
        let manifest = serde_json::to_vec_pretty(&snapshot.manifest)
            .map_err(|e| IndexStoreError::Io(format!("Failed to serialize manifest: {}", e)))?;
        let segments = serde_json::to_vec(&snapshot.segments)
            .map_err(|e| IndexStoreError::Io(format!("Failed to serialize segments: {}", e)))?;

        for (file, data) in [
            (SEGMENTS_FILE, segments),
            (VECTORS_FILE, encode_vectors(&snapshot.vectors)),
            (MANIFEST_FILE, manifest),
        ] {
            let path = dir.join(file);
            fs::write(&path, data).map_err(|e| io_error("Failed to write", &path, e))?;
        }

        Ok(())
    }

    /// Moves a set-aside index back into place after a failed install.
    fn restore_backup(&self, backup: &Path) -> Result<(), String> {
        fs::rename(backup, &self.base_path).map_err(|e| {
            warn!(
                backup = %backup.display(),
                error = %e,
                "Could not restore previous index"
            );
            format!("previous index left at {}", backup.display())
        })
    }

    fn read(&self, file: &str) -> Result<Vec<u8>, IndexStoreError> {
        let path = self.base_path.join(file);
        fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                IndexStoreError::Corrupted(format!("{} is missing", path.display()))
            }
            _ => io_error("Failed to read", &path, e),
        })
    }
}

impl IndexStore for LocalIndexStore {
    fn location(&self) -> &Path {
        &self.base_path
    }

    fn exists(&self) -> bool {
        self.base_path.join(MANIFEST_FILE).is_file()
    }

    fn save(&self, snapshot: &IndexSnapshot) -> Result<(), IndexStoreError> {
        if let Some(parent) = self.base_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error("Failed to create", parent, e))?;
        }

        let staging = self.sibling("tmp");
        fs::create_dir(&staging).map_err(|e| io_error("Failed to create", &staging, e))?;

        if let Err(e) = self.write_files(&staging, snapshot) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        let previous = if self.base_path.exists() {
            let backup = self.sibling("old");
            if let Err(e) = fs::rename(&self.base_path, &backup) {
                let _ = fs::remove_dir_all(&staging);
                return Err(io_error("Failed to move aside", &self.base_path, e));
            }
            Some(backup)
        } else {
            None
        };

        if let Err(e) = fs::rename(&staging, &self.base_path) {
            let _ = fs::remove_dir_all(&staging);
            let mut error = io_error("Failed to install", &self.base_path, e);
            if let Some(backup) = &previous {
                if let Err(note) = self.restore_backup(backup) {
                    if let IndexStoreError::Io(message) = &mut error {
                        message.push_str(&format!("; {}", note));
                    }
                }
            }
            return Err(error);
        }

        if let Some(backup) = previous {
            if let Err(e) = fs::remove_dir_all(&backup) {
                warn!(path = %backup.display(), error = %e, "Could not remove previous index");
            }
        }

        debug!(
            path = %self.base_path.display(),
            segments = snapshot.segments.len(),
            "Wrote index directory"
        );
        Ok(())
    }

    fn load(&self) -> Result<IndexSnapshot, IndexStoreError> {
        if !self.exists() {
            return Err(IndexStoreError::NotFound(self.base_path.clone()));
        }

        let manifest: IndexManifest = serde_json::from_slice(&self.read(MANIFEST_FILE)?)
            .map_err(|e| IndexStoreError::Corrupted(format!("Invalid {}: {}", MANIFEST_FILE, e)))?;

        if manifest.format_version != INDEX_FORMAT_VERSION {
            return Err(IndexStoreError::Corrupted(format!(
                "Unsupported index format version {} (expected {})",
                manifest.format_version, INDEX_FORMAT_VERSION
            )));
        }

        let segments: Vec<Segment> = serde_json::from_slice(&self.read(SEGMENTS_FILE)?)
            .map_err(|e| IndexStoreError::Corrupted(format!("Invalid {}: {}", SEGMENTS_FILE, e)))?;

        if segments.len() != manifest.segment_count {
            return Err(IndexStoreError::Corrupted(format!(
                "Manifest lists {} segments, {} holds {}",
                manifest.segment_count,
                SEGMENTS_FILE,
                segments.len()
            )));
        }

        let vectors = decode_vectors(
            &self.read(VECTORS_FILE)?,
            manifest.segment_count,
            manifest.dimension,
        )?;

        Ok(IndexSnapshot {
            manifest,
            segments,
            vectors,
        })
    }
}
