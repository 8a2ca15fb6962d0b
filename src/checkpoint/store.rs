//! Durable JSON artifacts.
//!
//! Every write goes to a temporary file in the target directory, is fsynced and
//! then renamed over the destination, so a crash leaves either the previous or
//! the new document, never a truncated one.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::state::Checkpoint;
use crate::error::HarvestError;
use crate::TARGET_CHECKPOINT;

/// Atomically replace `path` with the pretty-printed JSON form of `value`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), HarvestError> {
    let persistence_error = |source: std::io::Error| HarvestError::Persistence {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(persistence_error)?;

    let mut temp = NamedTempFile::new_in(&dir).map_err(persistence_error)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value)
            .map_err(|e| persistence_error(e.into()))?;
        writer.flush().map_err(persistence_error)?;
    }
    temp.as_file().sync_all().map_err(persistence_error)?;
    temp.persist(path)
        .map_err(|e| persistence_error(e.error))?;

    debug!(target: TARGET_CHECKPOINT, "Wrote {}", path.display());
    Ok(())
}

/// Read a JSON artifact. `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, HarvestError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(HarvestError::Persistence {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| HarvestError::CorruptArtifact {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// File-backed checkpoint store.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the checkpoint; a missing store yields an empty one.
    pub fn load(&self) -> Result<Checkpoint, HarvestError> {
        match read_json::<Checkpoint>(&self.path)? {
            Some(mut checkpoint) => {
                let stale = checkpoint.reconcile();
                info!(
                    target: TARGET_CHECKPOINT,
                    "Loaded checkpoint: {} processed, {} failed ({} stale failures dropped)",
                    checkpoint.processed.len(),
                    checkpoint.failed.len(),
                    stale
                );
                Ok(checkpoint)
            }
            None => {
                info!(target: TARGET_CHECKPOINT, "No checkpoint at {}, starting fresh", self.path.display());
                Ok(Checkpoint::default())
            }
        }
    }

    /// Stamp `last_updated` and persist atomically.
    pub fn save(&self, checkpoint: &mut Checkpoint) -> Result<(), HarvestError> {
        checkpoint.last_updated = Some(Utc::now());
        write_json_atomic(&self.path, checkpoint)
    }
}
