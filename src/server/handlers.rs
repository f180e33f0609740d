//! HTTP request handlers for the crop API.
//!
//! # Endpoints
//!
//! - `GET /{*path}` - Serve a crop (redirect or stream)
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, warn};

use crate::crop::{CropHandler, Delivery};
use crate::error::CropError;
use crate::store::ImageStore;

/// Response header reporting whether the crop already existed.
pub const CACHE_HIT_HEADER: &str = "X-Crop-Cache-Hit";

/// Content type for crops whose extension has no known type.
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the crop handler.
pub struct AppState<S: ImageStore> {
    /// The crop handler for processing crop requests
    pub handler: Arc<CropHandler<S>>,

    /// Cache-Control max-age in seconds for streamed crops
    pub cache_max_age: u32,
}

impl<S: ImageStore> AppState<S> {
    /// Create a new application state with the default max-age.
    pub fn new(handler: CropHandler<S>) -> Self {
        Self::with_cache_max_age(handler, crate::config::DEFAULT_CACHE_MAX_AGE)
    }

    /// Create a new application state with a custom max-age.
    pub fn with_cache_max_age(handler: CropHandler<S>, cache_max_age: u32) -> Self {
        Self {
            handler: Arc::new(handler),
            cache_max_age,
        }
    }
}

impl<S: ImageStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters for crop requests.
#[derive(Debug, Default, Deserialize)]
pub struct CropQueryParams {
    /// Signing token, required when signing is enabled
    #[serde(default)]
    pub token: Option<String>,
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "quota_exceeded")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert CropError to HTTP response.
///
/// A wrong token and an undecodable path produce the same 404 body, so
/// clients cannot tell which check failed. The detail only goes to the log.
impl IntoResponse for CropError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            CropError::TokenMismatch | CropError::NotFound { .. } => (
                StatusCode::NOT_FOUND,
                "not_found",
                "Not found".to_string(),
            ),

            CropError::QuotaExceeded { source_path } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "quota_exceeded",
                format!("Too many crops already exist for {}", source_path),
            ),

            CropError::Upstream(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "upstream_error",
                message.clone(),
            ),

            CropError::Transcode(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "transcode_error",
                err.to_string(),
            ),
        };

        // Log errors based on severity
        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Rejected crop request: {}",
                self
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle crop requests.
///
/// # Endpoint
///
/// `GET /{url_prefix}/{crop_path}?token={token}`
///
/// # Response
///
/// - `301 Moved Permanently`: crop stored remotely, `Location` is its URL
/// - `200 OK`: crop bytes with `Content-Type` from the crop extension
/// - `404 Not Found`: not a crop path, or wrong/missing token
/// - `500 Internal Server Error`: crop budget, source, store or encoder failure
///
/// # Headers
///
/// - `Cache-Control: public, max-age={cache_max_age}` (streamed crops)
/// - `X-Crop-Cache-Hit: true|false`
pub async fn crop_handler<S: ImageStore + 'static>(
    State(state): State<AppState<S>>,
    uri: Uri,
    Query(query): Query<CropQueryParams>,
) -> Result<Response, CropError> {
    let response = state
        .handler
        .handle(uri.path(), query.token.as_deref())
        .await?;

    let status = response.delivery.status();
    let builder = Response::builder()
        .status(status)
        .header(CACHE_HIT_HEADER, response.cache_hit.to_string());

    let http_response = match response.delivery {
        Delivery::Redirect { url } => builder
            .header(header::LOCATION, url)
            .body(Body::empty()),

        Delivery::Stream { path, content_type } => {
            let open_error = |e: std::io::Error| {
                CropError::Upstream(format!("failed to open {}: {}", path.display(), e))
            };
            let file = tokio::fs::File::open(&path).await.map_err(open_error)?;
            let length = file.metadata().await.map_err(open_error)?.len();

            builder
                .header(
                    header::CONTENT_TYPE,
                    content_type.unwrap_or(FALLBACK_CONTENT_TYPE),
                )
                .header(header::CONTENT_LENGTH, length)
                .header(
                    header::CACHE_CONTROL,
                    format!("public, max-age={}", state.cache_max_age),
                )
                .body(Body::from_stream(ReaderStream::new(file)))
        }
    };

    http_response.map_err(|e| CropError::Upstream(format!("invalid response: {}", e)))
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
