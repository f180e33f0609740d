//! # Crop Streamer
//!
//! An on-demand image crop server. Clients request a crop through a URL whose
//! path encodes the source image, the target size, crop options and output
//! format. Each variant is computed once, written to a crops store, and then
//! redirected to or streamed on every later request.
//!
//! ## Features
//!
//! - **URL-encoded transforms**: `photos/cat-200x100-quadrant(T).jpg` crops `photos/cat.jpg`
//! - **Bounded caches**: a per-source crop budget stops URL tampering from filling the store
//! - **Local or S3 storage**: sources and crops each live in a directory or a bucket
//! - **WebP variants**: `.webp` requests re-encode the primary crop through `cwebp`
//! - **Signed URLs**: optional HMAC-SHA256 tokens on crop paths
//!
//! ## Architecture
//!
//! - [`codec`] - Crop path grammar, options, signing tokens, URL generation
//! - [`io`] - Local and S3 disks with atomic writes
//! - [`store`] - Source + crops storage, crop budget, known-crop cache
//! - [`transform`] - Decode, trim, resize/crop/pad, encode
//! - [`transcode`] - External WebP encoder
//! - [`crop`] - The request handler and delivery decision
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use crop_streamer::{create_router, CropHandler, LocalDisk, PathCodec, RouterConfig, Storage};
//!
//! #[tokio::main]
//! async fn main() {
//!     let storage = Storage::new(
//!         Arc::new(LocalDisk::new("/srv/images")),
//!         Arc::new(LocalDisk::new("/srv/crops")),
//!     );
//!     let handler = CropHandler::new(PathCodec::new("/uploads"), storage);
//!     let router = create_router(handler, RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod codec;
pub mod config;
pub mod crop;
pub mod error;
pub mod io;
pub mod server;
pub mod store;
pub mod transcode;
pub mod transform;

// Re-export commonly used types
pub use codec::{
    CropOptions, CropRequest, OutputFormat, PathCodec, Quadrant, SigningKey, Trim,
    DEFAULT_MAX_DIMENSION, SECONDARY_SUFFIX,
};
pub use config::{Cli, Command, PurgeConfig, ResetConfig, ServeConfig, SignConfig, StorageArgs};
pub use crop::{content_type, CropHandler, CropResponse, Delivery};
pub use error::{CropError, IoError, TranscodeError, TransformError};
pub use io::{create_s3_client, Disk, LocalDisk, S3Disk};
pub use server::{
    create_router, crop_handler, health_handler, AppState, ErrorResponse, HealthResponse,
    RouterConfig,
};
pub use store::{ImageStore, KnownCrops, Storage, DEFAULT_MAX_CROPS};
pub use transcode::{CwebpTranscoder, Transcoder, DEFAULT_CWEBP_QUALITY};
pub use transform::{ImageEngine, TransformConfig, TransformEngine, DEFAULT_JPEG_QUALITY};
