/*
[INPUT]:  Serializable values and a fixed key per value
[OUTPUT]: JSON snapshots on disk, read back by key
[POS]:    State layer - local key-value persistence (offline fallback)
[UPDATE]: When changing snapshot layout or write strategy
*/

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::fs;

/// Key of the last confirmed task collection
pub const TASKS_SNAPSHOT_KEY: &str = "wing-kanban-tasks";
/// Key of the local-only reminder list
pub const REMINDERS_KEY: &str = "wing-kanban-reminders";
/// Key of the task collection owned by the local-only backend
pub const LOCAL_TASKS_KEY: &str = "wing-kanban-local-tasks";

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Temporary file error: {0}")]
    TempFile(#[from] tempfile::PersistError),

    #[error("Invalid snapshot key: {0}")]
    InvalidKey(String),

    #[error("Data corruption in {key}: {message}")]
    DataCorruption { key: String, message: String },
}

type Result<T> = std::result::Result<T, SnapshotError>;

/// Directory of `<key>.json` files
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read a value; `None` if nothing was ever written under `key`
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path_for(key)?;
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path).await?;
        match serde_json::from_str(&contents) {
            Ok(value) => Ok(Some(value)),
            Err(e) => Err(SnapshotError::DataCorruption {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// Atomically replace the value under `key`
    pub async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let path = self.path_for(key)?;
        let json_str = serde_json::to_string_pretty(value)?;
        let dir = self.dir.clone();

        fs::create_dir_all(&dir).await?;
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut temp_file = NamedTempFile::new_in(&dir)?;
            temp_file.write_all(json_str.as_bytes())?;
            temp_file.flush()?;
            temp_file.persist(&path)?;
            Ok(())
        })
        .await
        .map_err(|join| SnapshotError::Io(std::io::Error::other(join)))?
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(SnapshotError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}
