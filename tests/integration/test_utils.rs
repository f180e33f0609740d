//! Test utilities for integration tests.
//!
//! This module provides in-memory disks, counting engines and fake encoders
//! for exercising the crop handler without real infrastructure.

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, Rgb, RgbImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crop_streamer::codec::CropRequest;
use crop_streamer::error::{IoError, TranscodeError, TransformError};
use crop_streamer::io::{parent_dir, Disk, LocalDisk};
use crop_streamer::store::Storage;
use crop_streamer::transcode::Transcoder;
use crop_streamer::transform::{ImageEngine, TransformEngine};

// =============================================================================
// In-Memory Disk with Request Tracking
// =============================================================================

/// An in-memory disk that counts every operation.
///
/// Has no local root, so a `Storage` using it for crops treats them as remote.
pub struct MemoryDisk {
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
    exists_checks: Arc<AtomicUsize>,
    fail_reads: bool,
}

impl MemoryDisk {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            reads: Arc::new(AtomicUsize::new(0)),
            writes: Arc::new(AtomicUsize::new(0)),
            exists_checks: Arc::new(AtomicUsize::new(0)),
            fail_reads: false,
        }
    }

    /// A disk whose reads always fail with a connection error.
    pub fn failing() -> Self {
        Self {
            fail_reads: true,
            ..Self::new()
        }
    }

    pub fn with_object(self, key: &str, data: impl Into<Bytes>) -> Self {
        self.objects
            .try_write()
            .expect("fresh disk is unlocked")
            .insert(key.to_string(), data.into());
        self
    }

    pub async fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn exists_count(&self) -> usize {
        self.exists_checks.load(Ordering::SeqCst)
    }
}

impl Default for MemoryDisk {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryDisk {
    fn clone(&self) -> Self {
        Self {
            objects: Arc::clone(&self.objects),
            reads: Arc::clone(&self.reads),
            writes: Arc::clone(&self.writes),
            exists_checks: Arc::clone(&self.exists_checks),
            fail_reads: self.fail_reads,
        }
    }
}

#[async_trait]
impl Disk for MemoryDisk {
    async fn read(&self, key: &str) -> Result<Bytes, IoError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads {
            return Err(IoError::Connection("connection reset".to_string()));
        }
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| IoError::NotFound(key.to_string()))
    }

    async fn write(&self, key: &str, data: Bytes) -> Result<(), IoError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.objects.write().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, IoError> {
        self.exists_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>, IoError> {
        let dir = dir.trim_end_matches('/');
        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|key| parent_dir(key) == dir)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<String>, IoError> {
        Ok(self.objects.read().await.keys().cloned().collect())
    }

    async fn delete(&self, key: &str) -> Result<(), IoError> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    fn local_root(&self) -> Option<&Path> {
        None
    }

    fn identifier(&self) -> &str {
        "memory://"
    }
}

// =============================================================================
// Counting Transform Engine
// =============================================================================

/// Wraps the real engine, counting calls and optionally slowing them down.
#[derive(Clone)]
pub struct CountingEngine {
    inner: ImageEngine,
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl CountingEngine {
    pub fn new() -> Self {
        Self {
            inner: ImageEngine::default(),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    /// Sleep this long inside every transform to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for CountingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformEngine for CountingEngine {
    fn transform(&self, source: &[u8], request: &CropRequest) -> Result<Bytes, TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.inner.transform(source, request)
    }
}

// =============================================================================
// Fake Transcoders
// =============================================================================

/// Marker bytes the fake transcoder writes in front of the input.
pub const FAKE_WEBP_MARKER: &[u8] = b"FAKEWEBP";

/// A transcoder that prefixes the input with [`FAKE_WEBP_MARKER`].
#[derive(Clone, Default)]
pub struct FakeTranscoder {
    calls: Arc<AtomicUsize>,
    inputs: Arc<RwLock<Vec<(PathBuf, PathBuf)>>>,
}

impl FakeTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// (input, working_dir) of every call.
    pub async fn invocations(&self) -> Vec<(PathBuf, PathBuf)> {
        self.inputs.read().await.clone()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        working_dir: &Path,
    ) -> Result<(), TranscodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs
            .write()
            .await
            .push((input.to_path_buf(), working_dir.to_path_buf()));

        let data = tokio::fs::read(input)
            .await
            .map_err(|e| TranscodeError::Io(e.to_string()))?;
        let mut out = FAKE_WEBP_MARKER.to_vec();
        out.extend_from_slice(&data);
        tokio::fs::write(output, out)
            .await
            .map_err(|e| TranscodeError::Io(e.to_string()))
    }
}

/// A transcoder that always fails like a crashing encoder.
#[derive(Clone, Default)]
pub struct FailingTranscoder;

#[async_trait]
impl Transcoder for FailingTranscoder {
    async fn transcode(
        &self,
        _input: &Path,
        _output: &Path,
        _working_dir: &Path,
    ) -> Result<(), TranscodeError> {
        Err(TranscodeError::Failed {
            status: "exit status: 1".to_string(),
            stderr: "Could not process file".to_string(),
        })
    }
}

/// Write an executable shell script that behaves like `cwebp -q Q IN -o OUT`
/// by copying IN to OUT with a marker prefix.
#[cfg(unix)]
pub fn write_fake_cwebp(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-cwebp");
    let script = "#!/bin/sh\n\
                  [ \"$1\" = \"-q\" ] || exit 2\n\
                  [ \"$4\" = \"-o\" ] || exit 2\n\
                  printf 'FAKEWEBP' > \"$5\" && cat \"$3\" >> \"$5\"\n";
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

// =============================================================================
// Storage Helpers
// =============================================================================

/// Storage over two in-memory disks (remote crops).
pub fn remote_storage(src: &MemoryDisk, crops: &MemoryDisk) -> Storage {
    Storage::new(Arc::new(src.clone()), Arc::new(crops.clone()))
}

/// Storage over an in-memory source and a local crops directory.
pub fn local_storage(src: &MemoryDisk, crops_dir: &Path) -> Storage {
    Storage::new(Arc::new(src.clone()), Arc::new(LocalDisk::new(crops_dir)))
}

// =============================================================================
// Image Helpers
// =============================================================================

/// Create an RGB JPEG with a gradient so crops differ by region.
pub fn create_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Jpeg)
        .unwrap();
    buf
}

/// Check if data looks like a valid JPEG (SOI marker).
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8
}

/// Decoded dimensions of an encoded image.
pub fn image_dimensions(data: &[u8]) -> (u32, u32) {
    use image::GenericImageView;
    image::load_from_memory(data).unwrap().dimensions()
}
