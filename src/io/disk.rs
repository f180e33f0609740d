use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

/// Byte-level storage addressed by slash-separated keys.
///
/// Both source images and cached crops live on a `Disk`. Implementations
/// must be thread-safe; every method may be called concurrently.
#[async_trait]
pub trait Disk: Send + Sync {
    /// Read the whole object stored under `key`.
    async fn read(&self, key: &str) -> Result<Bytes, IoError>;

    /// Store `data` under `key`.
    ///
    /// The write must be all-or-nothing: a concurrent reader sees either the
    /// previous state or the complete new object, never a partial one.
    async fn write(&self, key: &str, data: Bytes) -> Result<(), IoError>;

    /// Whether an object exists under `key`.
    async fn exists(&self, key: &str) -> Result<bool, IoError>;

    /// Keys directly inside directory `dir` (`""` for the root).
    async fn list(&self, dir: &str) -> Result<Vec<String>, IoError>;

    /// Every key on the disk.
    async fn list_all(&self) -> Result<Vec<String>, IoError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), IoError>;

    /// Root directory when the disk is the local filesystem.
    fn local_root(&self) -> Option<&Path>;

    /// Identifier for logging, e.g. `s3://bucket/prefix` or `file:///srv/crops`.
    fn identifier(&self) -> &str;
}

/// Directory part of a key (`""` for keys at the root).
pub fn parent_dir(key: &str) -> &str {
    key.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Join a directory and a file name into a key.
pub fn join_key(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), name)
    }
}
