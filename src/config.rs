//! Configuration management for the crop server.
//!
//! This module provides the command-line interface:
//! - `serve`: run the HTTP server
//! - `sign`: print a (signed) crop URL for a source image
//! - `purge`: delete crops whose source image no longer exists
//! - `reset`: delete every crop of one source image
//!
//! Options fall back to environment variables with the `CROP_` prefix.
//!
//! # Environment Variables
//!
//! - `CROP_HOST` - Server bind address (default: 0.0.0.0)
//! - `CROP_PORT` - Server port (default: 3000)
//! - `CROP_SRC_DIR` / `CROP_SRC_BUCKET` - Where source images live
//! - `CROP_CROPS_DIR` / `CROP_CROPS_BUCKET` - Where crops are written
//! - `CROP_CROPS_PUBLIC_URL` - Public base URL of remote crops
//! - `CROP_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `CROP_S3_REGION` - AWS region (default: us-east-1)
//! - `CROP_URL_PREFIX` - Path prefix in front of crop paths (default: /)
//! - `CROP_SIGNING_KEY` - HMAC key for crop URL tokens
//! - `CROP_MAX_CROPS` - Crops per source image, 0 for unlimited (default: 12)
//! - `CROP_JPEG_QUALITY` - Default JPEG quality (default: 95)
//! - `CROP_MAX_DIMENSION` - Largest crop width or height (default: 5000)
//! - `CROP_CWEBP_PATH` - WebP encoder binary; enables `.webp` requests
//! - `CROP_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 86400)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::codec::DEFAULT_MAX_DIMENSION;
use crate::store::{DEFAULT_KNOWN_CROPS_CAPACITY, DEFAULT_MAX_CROPS};
use crate::transcode::DEFAULT_CWEBP_QUALITY;
use crate::transform::{is_valid_quality, DEFAULT_JPEG_QUALITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default URL prefix for crop paths.
pub const DEFAULT_URL_PREFIX: &str = "/";

/// Default HTTP cache max-age in seconds (1 day).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 86400;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Crop Streamer - on-demand image crops from the URL.
#[derive(Parser, Debug, Clone)]
#[command(name = "crop-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// The selected subcommand.
    pub fn into_command(self) -> Command {
        self.command
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the crop server
    Serve(ServeConfig),

    /// Print the URL of a crop, signed when a key is given
    Sign(SignConfig),

    /// Delete crops whose source image no longer exists
    Purge(PurgeConfig),

    /// Delete every crop of one source image
    Reset(ResetConfig),
}

/// Where a disk lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskLocation {
    /// A local directory
    Local(PathBuf),

    /// An S3 bucket, optionally under a key prefix
    S3 {
        bucket: String,
        prefix: Option<String>,
    },
}

impl DiskLocation {
    /// Whether this location is an S3 bucket.
    pub fn is_remote(&self) -> bool {
        matches!(self, DiskLocation::S3 { .. })
    }
}

// =============================================================================
// Storage Arguments
// =============================================================================

/// Source and crop storage, shared by every subcommand that touches images.
#[derive(Args, Debug, Clone, Default)]
pub struct StorageArgs {
    /// Local directory holding source images.
    #[arg(long, env = "CROP_SRC_DIR")]
    pub src_dir: Option<PathBuf>,

    /// S3 bucket holding source images.
    #[arg(long, env = "CROP_SRC_BUCKET")]
    pub src_bucket: Option<String>,

    /// Key prefix of source images inside the source bucket.
    #[arg(long, env = "CROP_SRC_PREFIX")]
    pub src_prefix: Option<String>,

    /// Local directory crops are written to.
    #[arg(long, env = "CROP_CROPS_DIR")]
    pub crops_dir: Option<PathBuf>,

    /// S3 bucket crops are written to.
    #[arg(long, env = "CROP_CROPS_BUCKET")]
    pub crops_bucket: Option<String>,

    /// Key prefix of crops inside the crops bucket.
    #[arg(long, env = "CROP_CROPS_PREFIX")]
    pub crops_prefix: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "CROP_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "CROP_S3_REGION")]
    pub s3_region: String,

    /// Maximum number of crops per source image (0 = unlimited).
    #[arg(long, default_value_t = DEFAULT_MAX_CROPS, env = "CROP_MAX_CROPS")]
    pub max_crops: usize,

    /// Number of crop keys remembered as existing.
    #[arg(long, default_value_t = DEFAULT_KNOWN_CROPS_CAPACITY, env = "CROP_KNOWN_CROPS")]
    pub known_crops: usize,
}

impl StorageArgs {
    /// Location of source images.
    pub fn source_location(&self) -> Result<DiskLocation, String> {
        location(
            "source",
            &self.src_dir,
            &self.src_bucket,
            &self.src_prefix,
            "--src-dir or --src-bucket",
        )
    }

    /// Location of crops.
    pub fn crops_location(&self) -> Result<DiskLocation, String> {
        location(
            "crops",
            &self.crops_dir,
            &self.crops_bucket,
            &self.crops_prefix,
            "--crops-dir or --crops-bucket",
        )
    }

    /// Whether any disk lives in S3.
    pub fn needs_s3(&self) -> bool {
        self.src_bucket.is_some() || self.crops_bucket.is_some()
    }

    /// Validate the storage options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.source_location()?;
        self.crops_location()?;

        if self.known_crops == 0 {
            return Err("known_crops must be greater than 0".to_string());
        }

        if let Some(ref endpoint) = self.s3_endpoint {
            url::Url::parse(endpoint)
                .map_err(|e| format!("Invalid S3 endpoint '{}': {}", endpoint, e))?;
        }

        Ok(())
    }
}

fn location(
    name: &str,
    dir: &Option<PathBuf>,
    bucket: &Option<String>,
    prefix: &Option<String>,
    flags: &str,
) -> Result<DiskLocation, String> {
    match (dir, bucket) {
        (Some(dir), None) => Ok(DiskLocation::Local(dir.clone())),
        (None, Some(bucket)) if !bucket.is_empty() => Ok(DiskLocation::S3 {
            bucket: bucket.clone(),
            prefix: prefix.clone(),
        }),
        (None, Some(_)) => Err(format!("The {} bucket name is empty", name)),
        (None, None) => Err(format!("No {} location given. Set {}", name, flags)),
        (Some(_), Some(_)) => Err(format!(
            "Both a directory and a bucket given for {}. Set only one of {}",
            name, flags
        )),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

/// Options for `serve`.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "CROP_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "CROP_PORT")]
    pub port: u16,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    #[command(flatten)]
    pub storage: StorageArgs,

    /// Public base URL remote crops are served from (required with --crops-bucket).
    #[arg(long, env = "CROP_CROPS_PUBLIC_URL")]
    pub crops_public_url: Option<String>,

    // =========================================================================
    // Crop Configuration
    // =========================================================================
    /// Path prefix in front of every crop path.
    #[arg(long, default_value = DEFAULT_URL_PREFIX, env = "CROP_URL_PREFIX")]
    pub url_prefix: String,

    /// Secret key for crop URL tokens. Without it, tokens are not checked.
    #[arg(long, env = "CROP_SIGNING_KEY")]
    pub signing_key: Option<String>,

    /// Allow crops larger than their source image.
    #[arg(long, default_value_t = false, env = "CROP_UPSCALE")]
    pub upscale: bool,

    /// Default JPEG quality (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "CROP_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// Largest width or height a crop may request. Larger requests get 404.
    #[arg(long, default_value_t = DEFAULT_MAX_DIMENSION, env = "CROP_MAX_DIMENSION")]
    pub max_dimension: u32,

    // =========================================================================
    // WebP Configuration
    // =========================================================================
    /// Path to a cwebp-compatible encoder. Enables `.webp` requests.
    #[arg(long, env = "CROP_CWEBP_PATH")]
    pub cwebp_path: Option<PathBuf>,

    /// WebP encoder quality (1-100).
    #[arg(long, default_value_t = DEFAULT_CWEBP_QUALITY, env = "CROP_CWEBP_QUALITY")]
    pub cwebp_quality: u8,

    // =========================================================================
    // HTTP Configuration
    // =========================================================================
    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "CROP_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "CROP_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;

        if self.storage.crops_location()?.is_remote() {
            match self.crops_public_url.as_deref() {
                None | Some("") => {
                    return Err(
                        "Crops are stored in a bucket but no public URL is set. \
                         Set --crops-public-url or CROP_CROPS_PUBLIC_URL"
                            .to_string(),
                    )
                }
                Some(public_url) => {
                    url::Url::parse(public_url)
                        .map_err(|e| format!("Invalid crops public URL '{}': {}", public_url, e))?;
                }
            }
        }

        if !is_valid_quality(self.jpeg_quality) {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }
        if !is_valid_quality(self.cwebp_quality) {
            return Err("cwebp_quality must be between 1 and 100".to_string());
        }

        if self.max_dimension == 0 {
            return Err("max_dimension must be greater than 0".to_string());
        }

        if matches!(self.signing_key.as_deref(), Some("")) {
            return Err("signing_key must not be empty".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Sign Command
// =============================================================================

/// Options for `sign`.
#[derive(Args, Debug, Clone)]
pub struct SignConfig {
    /// Source image path (e.g. photos/cat.jpg).
    pub source: String,

    /// Crop width in pixels. Omit for automatic.
    #[arg(short = 'W', long)]
    pub width: Option<u32>,

    /// Crop height in pixels. Omit for automatic.
    #[arg(short = 'H', long)]
    pub height: Option<u32>,

    /// Crop options, e.g. `resize`, `quadrant(T)`, `trim(0,0,10,10)`.
    #[arg(short, long = "option")]
    pub options: Vec<String>,

    /// Secret key for the token. Without it, the URL is unsigned.
    #[arg(long, env = "CROP_SIGNING_KEY")]
    pub signing_key: Option<String>,

    /// Path prefix in front of every crop path.
    #[arg(long, default_value = DEFAULT_URL_PREFIX, env = "CROP_URL_PREFIX")]
    pub url_prefix: String,

    /// Base URL to prepend (e.g. https://images.example.com).
    #[arg(long)]
    pub base_url: Option<String>,
}

impl SignConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.source.trim_matches('/').is_empty() {
            return Err("Source path must not be empty".to_string());
        }
        if matches!(self.signing_key.as_deref(), Some("")) {
            return Err("signing_key must not be empty".to_string());
        }
        if let Some(ref base_url) = self.base_url {
            url::Url::parse(base_url)
                .map_err(|e| format!("Invalid base URL '{}': {}", base_url, e))?;
        }
        Ok(())
    }

    /// Option segment as it appears in the crop path, e.g. `-resize-quadrant(T)`.
    pub fn options_segment(&self) -> String {
        self.options
            .iter()
            .map(|option| format!("-{}", option.trim_start_matches('-')))
            .collect()
    }
}

// =============================================================================
// Maintenance Commands
// =============================================================================

/// Options for `purge`.
#[derive(Args, Debug, Clone)]
pub struct PurgeConfig {
    #[command(flatten)]
    pub storage: StorageArgs,

    /// List the crops that would be deleted without deleting them.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// Options for `reset`.
#[derive(Args, Debug, Clone)]
pub struct ResetConfig {
    /// Source image whose crops are deleted (e.g. photos/cat.jpg).
    pub source: String,

    #[command(flatten)]
    pub storage: StorageArgs,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Tests
// =============================================================================
