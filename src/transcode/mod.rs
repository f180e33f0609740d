//! Secondary-format transcoding through an external encoder.
//!
//! Primary crops are produced by the transform engine. A request ending in
//! `.webp` additionally runs the primary crop through an external encoder
//! (`cwebp` by default):
//!
//! ```text
//! cwebp -q {quality} {input} -o {output}
//! ```
//!
//! The encoder runs as a child process in the crops working directory and the
//! calling request waits for it to exit.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::TranscodeError;

/// Default encoder quality.
pub const DEFAULT_CWEBP_QUALITY: u8 = 75;

/// Converts a primary crop file into a secondary format.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Read `input` and write the re-encoded image to `output`.
    ///
    /// Must fail if `output` does not exist afterwards.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        working_dir: &Path,
    ) -> Result<(), TranscodeError>;
}

/// Runs a `cwebp`-compatible binary.
#[derive(Debug, Clone)]
pub struct CwebpTranscoder {
    binary: PathBuf,
    quality: u8,
}

impl CwebpTranscoder {
    /// Create a transcoder for the encoder at `binary`.
    pub fn new(binary: impl Into<PathBuf>, quality: u8) -> Self {
        Self {
            binary: binary.into(),
            quality,
        }
    }

    /// Path of the encoder binary.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Arguments passed after the binary.
    pub fn args(&self, input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-q".to_string(),
            self.quality.to_string(),
            input.display().to_string(),
            "-o".to_string(),
            output.display().to_string(),
        ]
    }
}

#[async_trait]
impl Transcoder for CwebpTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        working_dir: &Path,
    ) -> Result<(), TranscodeError> {
        let start = Instant::now();
        let result = Command::new(&self.binary)
            .args(self.args(input, output))
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| TranscodeError::Spawn {
                binary: self.binary.display().to_string(),
                message: e.to_string(),
            })?;
        let elapsed = start.elapsed();

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            warn!(
                binary = %self.binary.display(),
                status = %result.status,
                "Encoder failed after {:?}",
                elapsed
            );
            return Err(TranscodeError::Failed {
                status: result.status.to_string(),
                stderr,
            });
        }

        let produced = tokio::fs::metadata(output)
            .await
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false);
        if !produced {
            return Err(TranscodeError::MissingOutput(output.display().to_string()));
        }

        debug!(
            input = %input.display(),
            output = %output.display(),
            "Encoder finished in {:?}",
            elapsed
        );
        Ok(())
    }
}
