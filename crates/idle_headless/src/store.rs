//! File-backed snapshot store.
//!
//! The format follows the file extension: `.bin` files hold the bincode
//! encoding, anything else holds the JSON save document. Writes go to a
//! sibling temp file first and are renamed into place, so a crash mid-write
//! leaves the previous save intact.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use idle_core::error::{GameError, Result};
use idle_core::persistence::{GameSnapshot, SnapshotStore};

/// Encoding used on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    /// camelCase JSON document.
    Json,
    /// bincode bytes.
    Binary,
}

impl StoreFormat {
    /// Pick the format from a path's extension.
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") => Self::Binary,
            _ => Self::Json,
        }
    }
}

/// Snapshot store backed by one file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    format: StoreFormat,
}

impl FileStore {
    /// Store at `path`, format chosen by extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = StoreFormat::for_path(&path);
        Self { path, format }
    }

    /// Path of the save file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encoding used for this file.
    #[must_use]
    pub fn format(&self) -> StoreFormat {
        self.format
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn storage_error(&self, action: &str, e: &std::io::Error) -> GameError {
        GameError::Storage(format!("{action} {}: {e}", self.path.display()))
    }
}

impl SnapshotStore for FileStore {
    fn load(&self) -> Result<Option<GameSnapshot>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.storage_error("Failed to read", &e)),
        };

        let snapshot = match self.format {
            StoreFormat::Binary => GameSnapshot::from_bytes(&bytes)?,
            StoreFormat::Json => {
                let text = String::from_utf8(bytes).map_err(|e| {
                    GameError::CorruptPersistedState(format!("save is not UTF-8: {e}"))
                })?;
                GameSnapshot::from_json(&text)?
            }
        };
        Ok(Some(snapshot))
    }

    fn save(&mut self, snapshot: &GameSnapshot) -> Result<()> {
        let bytes = match self.format {
            StoreFormat::Binary => snapshot.to_bytes()?,
            StoreFormat::Json => snapshot.to_json()?.into_bytes(),
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.storage_error("Failed to create", &e))?;
        }
        let temp = self.temp_path();
        fs::write(&temp, bytes).map_err(|e| self.storage_error("Failed to write", &e))?;
        fs::rename(&temp, &self.path).map_err(|e| self.storage_error("Failed to replace", &e))?;

        tracing::debug!(path = %self.path.display(), format = ?self.format, "Wrote save file");
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.storage_error("Failed to remove", &e)),
        }
    }
}
