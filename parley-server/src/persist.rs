//! State file carrying the snapshot across a restart.
//!
//! The file exists only between shutdown and the next startup:
//! [`StateFile::save`] writes it at shutdown, and [`StateFile::take`] reads
//! and removes it at startup so it never competes with the live stores.

use std::path::{Path, PathBuf};

use parley_proto::snapshot::{self, SnapshotError, StateSnapshot};

/// Errors that can occur while saving or loading the state file.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Reading, writing or removing the file failed.
    #[error("state file I/O error at {path}: {source}")]
    Io {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file contents could not be encoded or decoded.
    #[error("state file {path} is unusable: {source}")]
    Snapshot {
        /// Path of the file.
        path: PathBuf,
        /// Underlying codec error.
        source: SnapshotError,
    },
}

/// Location of the on-disk snapshot.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    /// Creates a handle for the file at `path`. Nothing is touched on disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the snapshot, replacing any previous file.
    ///
    /// The bytes go to a sibling temp file first and are renamed into place,
    /// so a crash mid-write leaves either the old file or the new one.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if encoding or any file operation fails.
    pub fn save(&self, state: &StateSnapshot) -> Result<(), PersistError> {
        let bytes = snapshot::encode(state).map_err(|source| PersistError::Snapshot {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &bytes).map_err(|source| PersistError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| PersistError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!(path = %self.path.display(), bytes = bytes.len(), "state saved");
        Ok(())
    }

    /// Reads the snapshot and removes the file.
    ///
    /// Returns `Ok(None)` if there is no file (fresh start). A file that
    /// cannot be decoded is left in place so it can be inspected.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the file cannot be read, decoded or removed.
    pub fn take(&self) -> Result<Option<StateSnapshot>, PersistError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no state file, starting fresh");
                return Ok(None);
            }
            Err(source) => {
                return Err(PersistError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let state = snapshot::decode(&bytes).map_err(|source| PersistError::Snapshot {
            path: self.path.clone(),
            source,
        })?;
        std::fs::remove_file(&self.path).map_err(|source| PersistError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!(path = %self.path.display(), "state loaded");
        Ok(Some(state))
    }
}
