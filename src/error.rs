use thiserror::Error;

/// I/O errors that can occur when reading from or writing to a disk
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Local filesystem error
    #[error("Filesystem error: {0}")]
    Local(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),
}

impl IoError {
    /// Map a `std::io::Error` for `key`, keeping not-found distinct.
    pub fn from_std(err: std::io::Error, key: &str) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            IoError::NotFound(key.to_string())
        } else {
            IoError::Local(format!("{}: {}", key, err))
        }
    }
}

/// Errors raised by the transform engine
#[derive(Debug, Clone, Error)]
pub enum TransformError {
    /// Source bytes could not be decoded as an image
    #[error("Failed to decode source image: {message}")]
    Decode { message: String },

    /// Output could not be encoded
    #[error("Failed to encode output image: {message}")]
    Encode { message: String },

    /// Output extension has no encoder
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// Requested or derived output exceeds the dimension limit
    #[error("Output {width}x{height} exceeds the {max} pixel limit")]
    TooLarge { width: u32, height: u32, max: u32 },
}

/// Errors raised while running the external encoder
#[derive(Debug, Clone, Error)]
pub enum TranscodeError {
    /// The encoder could not be started
    #[error("Failed to spawn encoder {binary}: {message}")]
    Spawn { binary: String, message: String },

    /// The encoder exited unsuccessfully
    #[error("Encoder exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    /// The encoder exited cleanly but left no output behind
    #[error("Encoder produced no output at {0}")]
    MissingOutput(String),

    /// Staging the input or collecting the output failed
    #[error("Transcode I/O error: {0}")]
    Io(String),
}

/// Errors surfaced by the crop request handler.
///
/// Every variant reaches the HTTP boundary; none are retried.
#[derive(Debug, Clone, Error)]
pub enum CropError {
    /// A signing token is required and the supplied one does not match
    #[error("Token mismatch")]
    TokenMismatch,

    /// The path does not decode as a crop request
    #[error("Not a crop request: {path}")]
    NotFound { path: String },

    /// The source image already has the maximum number of crops
    #[error("Too many crops for {source_path}")]
    QuotaExceeded { source_path: String },

    /// Reading the source or persisting the crop failed
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// The external encoder failed
    #[error("Transcode failed: {0}")]
    Transcode(#[from] TranscodeError),
}

impl From<IoError> for CropError {
    fn from(err: IoError) -> Self {
        CropError::Upstream(err.to_string())
    }
}

impl From<TransformError> for CropError {
    fn from(err: TransformError) -> Self {
        CropError::Upstream(err.to_string())
    }
}
