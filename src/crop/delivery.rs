use std::path::PathBuf;

use http::StatusCode;

/// How a crop reaches the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Permanent redirect to the crop's public URL (remote crops)
    Redirect { url: String },

    /// Stream the file at `path` (local crops)
    Stream {
        path: PathBuf,
        content_type: Option<&'static str>,
    },
}

impl Delivery {
    /// HTTP status for this delivery.
    pub fn status(&self) -> StatusCode {
        match self {
            Delivery::Redirect { .. } => StatusCode::MOVED_PERMANENTLY,
            Delivery::Stream { .. } => StatusCode::OK,
        }
    }
}

/// Result of a handled crop request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropResponse {
    /// Cache key of the delivered crop
    pub key: String,

    /// Whether the delivered crop already existed
    pub cache_hit: bool,

    /// Delivery instruction
    pub delivery: Delivery,
}

/// Content type for a path, from its extension.
///
/// Returns `None` for extensions outside the supported image formats.
pub fn content_type(path: &str) -> Option<&'static str> {
    let (_, ext) = path.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "jpeg" | "jpg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
