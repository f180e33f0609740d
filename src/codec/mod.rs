//! Path codec: maps request paths to crop requests and cache keys.
//!
//! # Responsibilities
//!
//! - [`PathCodec::relative_path`]: strip the URL prefix to get the cache key
//! - [`PathCodec::parse`]: decode a path into a [`CropRequest`]
//! - [`PathCodec::signing_token`]: expected `token` for a path, if signing is on
//! - [`PathCodec::path_to_url`]: public URL of a cached crop
//! - [`PathCodec::generate`]: build a (signed) crop URL for a source image

mod options;
mod parser;
mod signing;

pub use options::{CropOptions, Quadrant, Trim, DEFAULT_PAD_COLOR};
pub use parser::{
    has_image_extension, parse_crop_path, source_for_crop, CropRequest, OutputFormat,
    DEFAULT_MAX_DIMENSION,
};
pub use signing::SigningKey;

/// Suffix that asks for a WebP re-encoding of a primary crop.
pub const SECONDARY_SUFFIX: &str = ".webp";

/// Encodes and decodes crop paths for one deployment.
#[derive(Debug, Clone)]
pub struct PathCodec {
    /// URL path prefix in front of every crop, without surrounding slashes
    url_prefix: String,

    /// Base URL crops are publicly served from when stored remotely
    public_url: Option<String>,

    /// Key for signing tokens; `None` disables signing
    signing_key: Option<SigningKey>,

    /// Largest width or height a request may ask for
    max_dimension: u32,
}

impl PathCodec {
    /// Create a codec for crops served under `url_prefix` (e.g. `/uploads`).
    pub fn new(url_prefix: impl AsRef<str>) -> Self {
        Self {
            url_prefix: url_prefix.as_ref().trim_matches('/').to_string(),
            public_url: None,
            signing_key: None,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    /// Set the base URL remote crops are reachable at.
    pub fn with_public_url(mut self, public_url: impl Into<String>) -> Self {
        self.public_url = Some(public_url.into().trim_end_matches('/').to_string());
        self
    }

    /// Require signing tokens computed with `key`.
    pub fn with_signing_key(mut self, key: impl AsRef<[u8]>) -> Self {
        self.signing_key = Some(SigningKey::new(key));
        self
    }

    /// Refuse requests whose width or height exceeds `max_dimension`.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    /// Largest width or height a request may ask for.
    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Whether requests must carry a token.
    pub fn signing_enabled(&self) -> bool {
        self.signing_key.is_some()
    }

    /// Expected token for a request path, or `None` when signing is off.
    pub fn signing_token(&self, path: &str) -> Option<String> {
        let key = self.signing_key.as_ref()?;
        Some(key.token(&self.relative_path(path)?))
    }

    /// Check a supplied token. Always true when signing is off.
    pub fn verify_token(&self, path: &str, supplied: Option<&str>) -> bool {
        match &self.signing_key {
            None => true,
            Some(key) => match (self.relative_path(path), supplied) {
                (Some(relative), Some(token)) => key.verify(&relative, token),
                _ => false,
            },
        }
    }

    /// Decode a request path into a crop request.
    pub fn parse(&self, path: &str) -> Option<CropRequest> {
        self.parse_key(&self.relative_path(path)?)
    }

    /// Decode a cache key into a crop request, refusing oversized dimensions.
    pub fn parse_key(&self, key: &str) -> Option<CropRequest> {
        parse_crop_path(key).filter(|request| {
            [request.width, request.height]
                .iter()
                .flatten()
                .all(|&d| d <= self.max_dimension)
        })
    }

    /// Cache key for a request path: percent-decoded, without the URL prefix
    /// or leading slashes.
    ///
    /// `None` when the path is not under the URL prefix.
    pub fn relative_path(&self, path: &str) -> Option<String> {
        let decoded = urlencoding::decode(path)
            .map(|d| d.into_owned())
            .unwrap_or_else(|_| path.to_string());
        let trimmed = decoded.trim_start_matches('/');

        if self.url_prefix.is_empty() {
            return Some(trimmed.to_string());
        }

        match trimmed.strip_prefix(self.url_prefix.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => {
                Some(rest.trim_start_matches('/').to_string())
            }
            _ => None,
        }
    }

    /// Absolute URL a cached crop is served from.
    ///
    /// Falls back to a root-relative URL under the prefix when no public URL
    /// is configured.
    pub fn path_to_url(&self, key: &str) -> String {
        let encoded = encode_path(key);
        match &self.public_url {
            Some(base) => format!("{}/{}", base, encoded),
            None => self.local_url(&encoded),
        }
    }

    /// Build the request URL for a crop of `source_path`, including the
    /// `token` query parameter when signing is enabled.
    pub fn generate(
        &self,
        source_path: &str,
        width: Option<u32>,
        height: Option<u32>,
        options: &CropOptions,
    ) -> String {
        let source_path = source_path.trim_start_matches('/');
        let (stem, ext) = match source_path.rsplit_once('.') {
            Some((stem, ext)) if has_image_extension(source_path) => (stem, ext),
            _ => (source_path, "jpg"),
        };

        let key = format!(
            "{}-{}x{}{}.{}",
            stem,
            dimension(width),
            dimension(height),
            options.to_segment(),
            ext
        );
        let url = self.local_url(&encode_path(&key));

        match &self.signing_key {
            Some(signing) => format!("{}?token={}", url, signing.token(&key)),
            None => url,
        }
    }

    fn local_url(&self, encoded: &str) -> String {
        if self.url_prefix.is_empty() {
            format!("/{}", encoded)
        } else {
            format!("/{}/{}", self.url_prefix, encoded)
        }
    }
}

fn dimension(value: Option<u32>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "_".to_string())
}

fn encode_path(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
