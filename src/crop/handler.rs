//! Crop request handler.
//!
//! # Pipeline
//!
//! ```text
//! request path ──► token check ──► strip .webp ──► decode ──┐
//!                                                          ▼
//!            ┌────────────── crop exists? ──────────────────┐
//!            │ yes                                     no   │
//!            │                        budget ─► read source │
//!            │                        transform ─► write    │
//!            ▼                                              ▼
//!      [.webp requested + encoder configured: budget ─► transcode primary]
//!            │
//!            ▼
//!      redirect (remote crops) or stream (local crops)
//! ```
//!
//! Concurrent misses for the same key are not coordinated. Each computes the
//! crop and writes it; the store publishes writes atomically and the engine
//! is deterministic, so the last writer leaves the same complete bytes.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::codec::{has_image_extension, CropRequest, PathCodec, SECONDARY_SUFFIX};
use crate::error::{CropError, TranscodeError};
use crate::store::ImageStore;
use crate::transcode::Transcoder;
use crate::transform::{ImageEngine, TransformEngine};

use super::delivery::{content_type, CropResponse, Delivery};

/// Name of the staged primary crop when transcoding remote crops.
const STAGED_INPUT: &str = "input";

/// Name of the encoder output inside the staging directory.
const STAGED_OUTPUT: &str = "output.webp";

/// Orchestrates codec, store, engine and transcoder for one deployment.
pub struct CropHandler<S: ImageStore> {
    codec: PathCodec,
    store: Arc<S>,
    engine: Arc<dyn TransformEngine>,
    transcoder: Option<Arc<dyn Transcoder>>,
}

impl<S: ImageStore> CropHandler<S> {
    /// Create a handler with the default image engine and no transcoder.
    pub fn new(codec: PathCodec, store: S) -> Self {
        Self::with_shared_store(codec, Arc::new(store))
    }

    /// Create a handler over a store shared with other components.
    pub fn with_shared_store(codec: PathCodec, store: Arc<S>) -> Self {
        Self {
            codec,
            store,
            engine: Arc::new(ImageEngine::default()),
            transcoder: None,
        }
    }

    /// Replace the transform engine.
    pub fn with_engine(mut self, engine: impl TransformEngine + 'static) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    /// Enable `.webp` requests through `transcoder`.
    pub fn with_transcoder(mut self, transcoder: impl Transcoder + 'static) -> Self {
        self.transcoder = Some(Arc::new(transcoder));
        self
    }

    /// The path codec.
    pub fn codec(&self) -> &PathCodec {
        &self.codec
    }

    /// The image store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Whether `.webp` requests are transcoded.
    pub fn transcoding_enabled(&self) -> bool {
        self.transcoder.is_some()
    }

    /// Handle a crop request.
    ///
    /// `token` is the `token` query parameter, if any. Nothing is read,
    /// computed or written before the token is accepted.
    ///
    /// # Errors
    ///
    /// - [`CropError::TokenMismatch`]: signing is on and the token is wrong
    /// - [`CropError::NotFound`]: the path is not a crop path
    /// - [`CropError::QuotaExceeded`]: a new crop would exceed the budget
    /// - [`CropError::Upstream`]: the source or store failed
    /// - [`CropError::Transcode`]: the external encoder failed
    pub async fn handle(
        &self,
        request_path: &str,
        token: Option<&str>,
    ) -> Result<CropResponse, CropError> {
        if !self.codec.verify_token(request_path, token) {
            return Err(CropError::TokenMismatch);
        }

        let secondary = split_secondary_suffix(request_path);
        let primary_path = secondary.as_deref().unwrap_or(request_path);

        let not_found = || CropError::NotFound {
            path: request_path.to_string(),
        };
        let key = self.codec.relative_path(primary_path).ok_or_else(not_found)?;
        let request = self.codec.parse_key(&key).ok_or_else(not_found)?;

        let mut cache_hit = self.populate(&key, &request).await?;

        let key = match (&self.transcoder, secondary.is_some()) {
            (Some(transcoder), true) => {
                let (secondary_key, hit) =
                    self.ensure_secondary(transcoder, &key, &request).await?;
                cache_hit = hit;
                secondary_key
            }
            _ => key,
        };

        let delivery = self.delivery(&key)?;
        Ok(CropResponse {
            key,
            cache_hit,
            delivery,
        })
    }

    /// Make sure the primary crop exists. Returns `true` on a cache hit.
    async fn populate(&self, key: &str, request: &CropRequest) -> Result<bool, CropError> {
        if self.store.crop_exists(key).await? {
            debug!(key = key, "Crop cache hit");
            return Ok(true);
        }

        // The budget only gates creating new keys
        self.check_budget(key, request).await?;

        let source = self.store.read_source(&request.source_path).await?;

        let start = Instant::now();
        let engine = Arc::clone(&self.engine);
        let owned = request.clone();
        let data = tokio::task::spawn_blocking(move || engine.transform(&source, &owned))
            .await
            .map_err(|e| CropError::Upstream(format!("transform task failed: {}", e)))??;

        let size = data.len();
        self.store.write_crop(key, data).await?;

        info!(
            key = key,
            bytes = size,
            "Created crop in {:?}",
            start.elapsed()
        );
        Ok(false)
    }

    /// Fail with `QuotaExceeded` when `key` would be one crop too many.
    async fn check_budget(&self, key: &str, request: &CropRequest) -> Result<(), CropError> {
        if !self.store.too_many_crops(&request.source_path).await? {
            return Ok(());
        }
        warn!(
            key = key,
            source = request.source_path.as_str(),
            "Crop budget exhausted"
        );
        Err(CropError::QuotaExceeded {
            source_path: request.source_path.clone(),
        })
    }

    /// Make sure the `.webp` variant of `primary_key` exists.
    ///
    /// Returns the secondary key and whether it already existed. A new
    /// secondary counts against the crop budget like any other key.
    async fn ensure_secondary(
        &self,
        transcoder: &Arc<dyn Transcoder>,
        primary_key: &str,
        request: &CropRequest,
    ) -> Result<(String, bool), CropError> {
        let secondary_key = format!("{}{}", primary_key, SECONDARY_SUFFIX);
        if self.store.crop_exists(&secondary_key).await? {
            debug!(key = secondary_key.as_str(), "Secondary cache hit");
            return Ok((secondary_key, true));
        }

        self.check_budget(&secondary_key, request).await?;

        let staging = tempfile::tempdir().map_err(transcode_io)?;
        let output = staging.path().join(STAGED_OUTPUT);

        let (input, working_dir) = match self.store.local_crops_dir() {
            Some(dir) => (dir.join(primary_key), dir.to_path_buf()),
            None => {
                let input = staging.path().join(STAGED_INPUT);
                let primary = self.store.read_crop(primary_key).await?;
                tokio::fs::write(&input, &primary)
                    .await
                    .map_err(transcode_io)?;
                (input, staging.path().to_path_buf())
            }
        };

        transcoder
            .transcode(&input, &output, &working_dir)
            .await?;

        let data = read_output(&output).await?;
        self.store.write_crop(&secondary_key, data).await?;

        debug!(key = secondary_key.as_str(), "Created secondary crop");
        Ok((secondary_key, false))
    }

    fn delivery(&self, key: &str) -> Result<Delivery, CropError> {
        if self.store.crops_are_remote() {
            return Ok(Delivery::Redirect {
                url: self.codec.path_to_url(key),
            });
        }

        let dir = self
            .store
            .local_crops_dir()
            .ok_or_else(|| CropError::Upstream("crops have no local directory".to_string()))?;
        Ok(Delivery::Stream {
            path: dir.join(key),
            content_type: content_type(key),
        })
    }
}

/// Primary request path for a `.webp` request, or `None` if the path has no
/// secondary suffix.
///
/// `photos/cat-200x100.jpg.webp` maps to `photos/cat-200x100.jpg`. A stem
/// without an image extension is derived from the JPEG crop:
/// `photos/cat.jpg-200x100.webp` maps to `photos/cat.jpg-200x100.jpg`.
pub fn split_secondary_suffix(path: &str) -> Option<String> {
    let stem = path.strip_suffix(SECONDARY_SUFFIX)?;
    if has_image_extension(stem) {
        Some(stem.to_string())
    } else {
        Some(format!("{}.jpg", stem))
    }
}

async fn read_output(output: &Path) -> Result<bytes::Bytes, CropError> {
    let data = tokio::fs::read(output).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            TranscodeError::MissingOutput(output.display().to_string())
        } else {
            transcode_io(e)
        }
    })?;
    if data.is_empty() {
        return Err(TranscodeError::MissingOutput(output.display().to_string()).into());
    }
    Ok(bytes::Bytes::from(data))
}

fn transcode_io(err: std::io::Error) -> TranscodeError {
    TranscodeError::Io(err.to_string())
}
