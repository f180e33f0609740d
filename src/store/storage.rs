//! Image store backed by a source disk and a crops disk.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use crate::codec::{source_for_crop, SECONDARY_SUFFIX};
use crate::error::IoError;
use crate::io::{parent_dir, Disk};

use super::known::{KnownCrops, DEFAULT_KNOWN_CROPS_CAPACITY};

/// Default maximum number of crops per source image.
pub const DEFAULT_MAX_CROPS: usize = 12;

// =============================================================================
// ImageStore Trait
// =============================================================================

/// Storage contract the crop handler relies on.
///
/// All persisted bytes belong to the store. `write_crop` must publish
/// atomically so that concurrent misses for the same key are safe.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Whether crops are served from a remote location (redirect) rather
    /// than streamed from the local filesystem.
    fn crops_are_remote(&self) -> bool;

    /// Root directory of locally stored crops.
    fn local_crops_dir(&self) -> Option<&Path>;

    /// Whether `source_path` already has its maximum number of crops.
    async fn too_many_crops(&self, source_path: &str) -> Result<bool, IoError>;

    /// Whether a crop is stored under `key`.
    async fn crop_exists(&self, key: &str) -> Result<bool, IoError>;

    /// Read a source image.
    async fn read_source(&self, source_path: &str) -> Result<Bytes, IoError>;

    /// Read a stored crop.
    async fn read_crop(&self, key: &str) -> Result<Bytes, IoError>;

    /// Store a crop under `key`.
    async fn write_crop(&self, key: &str, data: Bytes) -> Result<(), IoError>;
}

// =============================================================================
// Storage
// =============================================================================

/// The standard image store: sources on one disk, crops on another.
///
/// The two disks may be the same backend (e.g. one local directory) or
/// differ (sources on S3, crops on local disk, or the other way around).
pub struct Storage {
    src: Arc<dyn Disk>,
    crops: Arc<dyn Disk>,
    max_crops: usize,
    known: KnownCrops,
}

impl Storage {
    /// Create a store with the default crop budget.
    pub fn new(src: Arc<dyn Disk>, crops: Arc<dyn Disk>) -> Self {
        Self {
            src,
            crops,
            max_crops: DEFAULT_MAX_CROPS,
            known: KnownCrops::with_capacity(DEFAULT_KNOWN_CROPS_CAPACITY),
        }
    }

    /// Set the per-source crop budget. `0` disables the budget.
    pub fn with_max_crops(mut self, max_crops: usize) -> Self {
        self.max_crops = max_crops;
        self
    }

    /// Set how many existing crop keys are remembered in memory.
    pub fn with_known_crops_capacity(mut self, capacity: usize) -> Self {
        self.known = KnownCrops::with_capacity(capacity);
        self
    }

    /// The configured crop budget (`0` = unlimited).
    pub fn max_crops(&self) -> usize {
        self.max_crops
    }

    /// The disk sources are read from.
    pub fn src_disk(&self) -> &Arc<dyn Disk> {
        &self.src
    }

    /// The disk crops are written to.
    pub fn crops_disk(&self) -> &Arc<dyn Disk> {
        &self.crops
    }

    /// Crop keys generated from `source_path`, secondary variants included.
    pub async fn list_crops(&self, source_path: &str) -> Result<Vec<String>, IoError> {
        let source_path = source_path.trim_start_matches('/');
        let siblings = self.crops.list(parent_dir(source_path)).await?;
        Ok(siblings
            .into_iter()
            .filter(|key| crop_source(key).as_deref() == Some(source_path))
            .collect())
    }

    /// Every crop key on the crops disk, primaries and secondaries.
    pub async fn list_all_crops(&self) -> Result<Vec<String>, IoError> {
        let keys = self.crops.list_all().await?;
        Ok(keys
            .into_iter()
            .filter(|key| crop_source(key).is_some())
            .collect())
    }

    /// Delete every crop (including secondary variants) of `source_path`.
    ///
    /// Returns the deleted keys.
    pub async fn delete_crops(&self, source_path: &str) -> Result<Vec<String>, IoError> {
        let source_path = source_path.trim_start_matches('/');
        let mut deleted = Vec::new();

        for key in self.list_crops(source_path).await? {
            self.crops.delete(&key).await?;
            self.known.remove(&key).await;
            deleted.push(key);
        }

        info!(
            source = source_path,
            count = deleted.len(),
            "Deleted crops from {}",
            self.crops.identifier()
        );
        Ok(deleted)
    }

    /// Delete crops whose source image no longer exists.
    ///
    /// With `dry_run` nothing is deleted. Returns the affected keys.
    pub async fn purge(&self, dry_run: bool) -> Result<Vec<String>, IoError> {
        let mut orphans = Vec::new();

        for key in self.list_all_crops().await? {
            let Some(source) = crop_source(&key) else {
                continue;
            };
            if self.src.exists(&source).await? {
                continue;
            }
            if !dry_run {
                self.crops.delete(&key).await?;
                self.known.remove(&key).await;
            }
            debug!(key = key.as_str(), source = source.as_str(), dry_run, "Orphaned crop");
            orphans.push(key);
        }

        Ok(orphans)
    }
}

/// Source of a primary or secondary crop key.
fn crop_source(key: &str) -> Option<String> {
    let primary = key.strip_suffix(SECONDARY_SUFFIX).unwrap_or(key);
    source_for_crop(primary)
}

#[async_trait]
impl ImageStore for Storage {
    fn crops_are_remote(&self) -> bool {
        self.crops.local_root().is_none()
    }

    fn local_crops_dir(&self) -> Option<&Path> {
        self.crops.local_root()
    }

    async fn too_many_crops(&self, source_path: &str) -> Result<bool, IoError> {
        if self.max_crops == 0 {
            return Ok(false);
        }
        let count = self.list_crops(source_path).await?.len();
        debug!(
            source = source_path,
            count,
            max = self.max_crops,
            "Crop budget check"
        );
        Ok(count >= self.max_crops)
    }

    async fn crop_exists(&self, key: &str) -> Result<bool, IoError> {
        if self.known.contains(key).await {
            return Ok(true);
        }
        let exists = self.crops.exists(key).await?;
        if exists {
            self.known.insert(key).await;
        }
        Ok(exists)
    }

    async fn read_source(&self, source_path: &str) -> Result<Bytes, IoError> {
        self.src.read(source_path).await
    }

    async fn read_crop(&self, key: &str) -> Result<Bytes, IoError> {
        self.crops.read(key).await
    }

    async fn write_crop(&self, key: &str, data: Bytes) -> Result<(), IoError> {
        self.crops.write(key, data).await?;
        self.known.insert(key).await;
        Ok(())
    }
}
