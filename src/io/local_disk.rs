//! Local filesystem disk.
//!
//! Writes go to a temporary file in the destination directory and are then
//! renamed into place, so readers never observe a half-written crop.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::NamedTempFile;
use tracing::debug;

use super::disk::{join_key, Disk};
use crate::error::IoError;

/// Disk rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalDisk {
    root: PathBuf,
    identifier: String,
}

impl LocalDisk {
    /// Create a disk rooted at `root`. The directory does not need to exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let identifier = format!("file://{}", root.display());
        Self { root, identifier }
    }

    /// Absolute path of `key`, rejecting keys that escape the root.
    pub fn resolve(&self, key: &str) -> Result<PathBuf, IoError> {
        let relative = Path::new(key.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(IoError::NotFound(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
        let parent = path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "key has no parent")
        })?;
        std::fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[async_trait]
impl Disk for LocalDisk {
    async fn read(&self, key: &str) -> Result<Bytes, IoError> {
        let path = self.resolve(key)?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| IoError::from_std(e, key))?;
        Ok(Bytes::from(data))
    }

    async fn write(&self, key: &str, data: Bytes) -> Result<(), IoError> {
        let path = self.resolve(key)?;
        let len = data.len();

        tokio::task::spawn_blocking(move || Self::write_atomic(&path, &data))
            .await
            .map_err(|e| IoError::Local(format!("write task failed: {}", e)))?
            .map_err(|e| IoError::from_std(e, key))?;

        debug!(key = key, bytes = len, "Wrote {}", self.identifier);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, IoError> {
        let path = match self.resolve(key) {
            Ok(path) => path,
            Err(_) => return Ok(false),
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(IoError::from_std(e, key)),
        }
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>, IoError> {
        let dir = dir.trim_matches('/');
        let path = if dir.is_empty() {
            self.root.clone()
        } else {
            self.resolve(dir)?
        };

        let mut entries = match tokio::fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(IoError::from_std(e, dir)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| IoError::from_std(e, dir))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();
            // Hidden files include in-flight temporaries
            if is_file && !name.starts_with('.') {
                keys.push(join_key(dir, &name));
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn list_all(&self) -> Result<Vec<String>, IoError> {
        let mut keys = Vec::new();
        let mut pending = vec![String::new()];

        while let Some(dir) = pending.pop() {
            let path = if dir.is_empty() {
                self.root.clone()
            } else {
                self.root.join(&dir)
            };
            let mut entries = match tokio::fs::read_dir(&path).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(IoError::from_std(e, &dir)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| IoError::from_std(e, &dir))?
            {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') {
                    continue;
                }
                let key = join_key(&dir, &name);
                match entry.file_type().await {
                    Ok(t) if t.is_dir() => pending.push(key),
                    Ok(t) if t.is_file() => keys.push(key),
                    _ => {}
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<(), IoError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IoError::from_std(e, key)),
        }
    }

    fn local_root(&self) -> Option<&Path> {
        Some(&self.root)
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
