//! File-storage collaborator
//!
//! The routing core never touches storage; the transit-layer loader and the
//! surrounding system move bundles and result grids through a [`FileStore`].
//! Stored files are immutable after publication. Paths are validated against
//! directory traversal before any I/O happens.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Path {0:?} contains a directory traversal")]
    DirectoryTraversal(String),
    #[error("Key {0:?} does not exist")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageCategory {
    Bundles,
    Grids,
    Results,
    Resources,
    Polygons,
    Taui,
}

impl StorageCategory {
    fn directory(self) -> &'static str {
        match self {
            StorageCategory::Bundles => "bundles",
            StorageCategory::Grids => "grids",
            StorageCategory::Results => "results",
            StorageCategory::Resources => "resources",
            StorageCategory::Polygons => "polygons",
            StorageCategory::Taui => "taui",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageKey {
    pub category: StorageCategory,
    pub path: String,
}

impl StorageKey {
    pub fn new(category: StorageCategory, path: impl Into<String>) -> Result<Self, StorageError> {
        let path = path.into();
        validate_path(&path)?;
        Ok(StorageKey { category, path })
    }
}

/// Rejected before any I/O.
fn validate_path(path: &str) -> Result<(), StorageError> {
    if path.contains("../") || path.contains("..\\") {
        return Err(StorageError::DirectoryTraversal(path.to_string()));
    }
    Ok(())
}

/// Capability the surrounding system provides for persisting files.
pub trait FileStore: Send + Sync {
    /// Move an existing file into storage under the key.
    fn move_into_storage(&self, key: &StorageKey, file: &Path) -> Result<(), StorageError>;
    /// Publish an in-memory buffer under the key.
    fn store_bytes(&self, key: &StorageKey, buffer: &[u8]) -> Result<(), StorageError>;
    /// Fetch a stored file to a local path; the result is read-only.
    fn get_file(&self, key: &StorageKey) -> Result<PathBuf, StorageError>;
    /// A URL equivalent of the key, for handing to external consumers.
    fn get_url(&self, key: &StorageKey) -> String;
    fn delete(&self, key: &StorageKey) -> Result<(), StorageError>;
    fn exists(&self, key: &StorageKey) -> bool;
}

/// Stores files under a base directory on the local filesystem.
#[derive(Debug)]
pub struct LocalFileStore {
    base: PathBuf,
}

impl LocalFileStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        LocalFileStore { base: base.into() }
    }

    fn resolve(&self, key: &StorageKey) -> Result<PathBuf, StorageError> {
        validate_path(&key.path)?;
        Ok(self
            .base
            .join(key.category.directory())
            .join(&key.path))
    }
}

impl FileStore for LocalFileStore {
    fn move_into_storage(&self, key: &StorageKey, file: &Path) -> Result<(), StorageError> {
        let target = self.resolve(key)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        // Rename fails across filesystems; fall back to copy + remove.
        if fs::rename(file, &target).is_err() {
            fs::copy(file, &target)?;
            fs::remove_file(file)?;
        }
        info!("Stored {:?} as {}/{}", file, key.category.directory(), key.path);
        Ok(())
    }

    fn store_bytes(&self, key: &StorageKey, buffer: &[u8]) -> Result<(), StorageError> {
        let target = self.resolve(key)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, buffer)?;
        Ok(())
    }

    fn get_file(&self, key: &StorageKey) -> Result<PathBuf, StorageError> {
        let target = self.resolve(key)?;
        if !target.exists() {
            return Err(StorageError::NotFound(key.path.clone()));
        }
        Ok(target)
    }

    fn get_url(&self, key: &StorageKey) -> String {
        format!(
            "file://{}",
            self.base
                .join(key.category.directory())
                .join(&key.path)
                .display()
        )
    }

    fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        let target = self.resolve(key)?;
        fs::remove_file(target)?;
        Ok(())
    }

    fn exists(&self, key: &StorageKey) -> bool {
        self.resolve(key).is_ok_and(|target| target.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_paths_are_rejected_before_io() {
        let error = StorageKey::new(StorageCategory::Results, "../escape.json");
        assert!(matches!(error, Err(StorageError::DirectoryTraversal(_))));
        let windows = StorageKey::new(StorageCategory::Results, "a\\..\\b");
        assert!(matches!(windows, Err(StorageError::DirectoryTraversal(_))));
    }

    #[test]
    fn store_and_fetch_round_trip() {
        let base = std::env::temp_dir().join(format!("tranvia-store-{}", std::process::id()));
        let store = LocalFileStore::new(&base);
        let key = StorageKey::new(StorageCategory::Grids, "region/grid.bin").unwrap();

        assert!(!store.exists(&key));
        store.store_bytes(&key, b"payload").unwrap();
        assert!(store.exists(&key));
        let path = store.get_file(&key).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"payload");
        store.delete(&key).unwrap();
        assert!(!store.exists(&key));
        let _ = fs::remove_dir_all(&base);
    }
}
