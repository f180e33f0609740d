//! Crop request handling and delivery.
//!
//! - [`CropHandler`]: validates, populates the cache, transcodes, and picks
//!   how the crop is delivered
//! - [`Delivery`]: redirect to a remote URL or stream a local file
//! - [`content_type`]: extension to MIME type

mod delivery;
mod handler;

pub use delivery::{content_type, CropResponse, Delivery};
pub use handler::{split_secondary_suffix, CropHandler};
