//! HTTP server layer for the crop service.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │              GET /{url_prefix}/{crop_path}?token=               │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌────────────────────────────┐   │
//! │  │        handlers          │  │          routes            │   │
//! │  │ (redirect / stream)      │  │  (router, CORS, tracing)   │   │
//! │  └──────────────────────────┘  └────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    crop_handler, health_handler, AppState, CropQueryParams, ErrorResponse, HealthResponse,
    CACHE_HIT_HEADER,
};
pub use routes::{create_router, RouterConfig};
