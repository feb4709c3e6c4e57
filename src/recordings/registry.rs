//! Catalog of finalized recordings

use parking_lot::RwLock;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::audio::wav::probe_duration_secs;
use crate::error::RecordingError;

/// A registered, immutable capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub id: String,
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<u64>,
}

/// Insertion-ordered recording list
#[derive(Default)]
pub struct RecordingRegistry {
    entries: RwLock<Vec<Recording>>,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly completed file, stamped with the current time
    pub fn register(&self, path: &Path) -> Result<Recording, RecordingError> {
        self.register_at(path, chrono::Utc::now().timestamp_millis())
    }

    fn register_at(&self, path: &Path, timestamp: i64) -> Result<Recording, RecordingError> {
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let meta = std::fs::metadata(&path).map_err(|source| RecordingError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let duration_sec = probe_duration_secs(&path);

        let mut entries = self.entries.write();
        // Same name within the same millisecond: nudge until the id is free
        let mut timestamp = timestamp;
        let mut id = format!("{}_{}", name, timestamp);
        while entries.iter().any(|r| r.id == id) {
            timestamp += 1;
            id = format!("{}_{}", name, timestamp);
        }

        let recording = Recording {
            id,
            name,
            path,
            timestamp,
            size_bytes: meta.len(),
            duration_sec,
        };
        entries.push(recording.clone());
        tracing::info!(
            "Recording added: {} ({} bytes, duration {:?}s)",
            recording.id,
            recording.size_bytes,
            recording.duration_sec
        );
        Ok(recording)
    }

    /// Exact id first, then the oldest entry with that name
    pub fn find_by_id_or_name(&self, key: &str) -> Option<Recording> {
        let entries = self.entries.read();
        entries
            .iter()
            .find(|r| r.id == key)
            .or_else(|| entries.iter().find(|r| r.name == key))
            .cloned()
    }

    /// Register every file in `dir` not already known. Returns how many were added.
    pub fn scan_directory(&self, dir: &Path) -> Result<usize, RecordingError> {
        if !dir.is_dir() {
            tracing::info!("Recording scan skipped, no directory at {}", dir.display());
            return Ok(0);
        }

        let io_err = |source| RecordingError::Io {
            path: dir.display().to_string(),
            source,
        };
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(io_err)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        let mut added = 0;
        for file in files {
            let canonical = std::fs::canonicalize(&file).unwrap_or_else(|_| file.clone());
            if self.contains_path(&canonical) {
                continue;
            }
            let modified = std::fs::metadata(&file)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0);
            match self.register_at(&file, modified) {
                Ok(_) => added += 1,
                Err(e) => tracing::warn!("Skipping {}: {}", file.display(), e),
            }
        }
        Ok(added)
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.entries.read().iter().any(|r| r.path == path)
    }

    /// Snapshot in insertion order
    pub fn list_all(&self) -> Vec<Recording> {
        self.entries.read().clone()
    }

    /// JSON array shared by `/api/recordings` and `REC_LIST`
    pub fn to_json(&self) -> String {
        serde_json::to_string(&*self.entries.read()).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
