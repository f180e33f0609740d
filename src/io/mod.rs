//! Byte-level storage.
//!
//! Source images and cached crops are read and written through the [`Disk`]
//! trait, with implementations for the local filesystem and S3.

mod disk;
mod local_disk;
mod s3_disk;

pub use disk::{join_key, parent_dir, Disk};
pub use local_disk::LocalDisk;
pub use s3_disk::{create_s3_client, S3Disk};
