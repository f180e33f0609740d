//! Image store.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               CropHandler               │
//! └────────────────────┬────────────────────┘
//!                      │ ImageStore
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │                Storage                  │
//! │  crop budget, known-crop LRU, purge     │
//! └──────────┬───────────────────┬──────────┘
//!            ▼                   ▼
//!      source disk          crops disk
//!   (LocalDisk / S3Disk) (LocalDisk / S3Disk)
//! ```

mod known;
mod storage;

pub use known::{KnownCrops, DEFAULT_KNOWN_CROPS_CAPACITY};
pub use storage::{ImageStore, Storage, DEFAULT_MAX_CROPS};
