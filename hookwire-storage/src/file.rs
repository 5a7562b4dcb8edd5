//! Storage kept in one JSON document on disk

use crate::{Storage, StorageError};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Storage that keeps every key in a single JSON object file
///
/// The file is read on every access and rewritten on every write. A file
/// that does not exist yet reads as empty.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every stored key and value
    pub fn load(&self) -> Result<Map<String, Value>, StorageError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let data = fs::read(&self.path)?;
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }
        Ok(serde_json::from_slice(&data)?)
    }

    fn save(&self, values: &Map<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(values)?;
        fs::write(&self.path, json)?;
        tracing::debug!(path = ?self.path, keys = values.len(), "storage file written");
        Ok(())
    }

    /// Delete a key; returns whether it was stored
    pub fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let mut values = self.load()?;
        if values.remove(key).is_none() {
            return Ok(false);
        }
        self.save(&values)?;
        Ok(true)
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let mut values = self.load()?;
        values.insert(key.to_string(), value.clone());
        self.save(&values)
    }
}
