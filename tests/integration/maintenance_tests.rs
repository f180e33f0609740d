//! Maintenance tests: reset and purge.
//!
//! Tests verify:
//! - Reset removes every crop of one source, secondaries included
//! - Reset frees the crop budget and forgets known crops
//! - Purge only removes crops whose source is gone, and dry runs delete nothing

use std::sync::Arc;

use crop_streamer::codec::PathCodec;
use crop_streamer::crop::CropHandler;
use crop_streamer::error::CropError;
use crop_streamer::io::Disk;
use crop_streamer::store::Storage;

use super::test_utils::{create_test_jpeg, remote_storage, FakeTranscoder, MemoryDisk};

fn handler_over(storage: Storage) -> CropHandler<Storage> {
    CropHandler::with_shared_store(
        PathCodec::new("/").with_public_url("https://cdn.example.com"),
        Arc::new(storage),
    )
    .with_transcoder(FakeTranscoder::new())
}

#[tokio::test]
async fn test_reset_removes_all_variants_and_frees_budget() {
    let src = MemoryDisk::new()
        .with_object("photos/cat.jpg", create_test_jpeg(100, 100))
        .with_object("photos/dog.jpg", create_test_jpeg(100, 100));
    let crops = MemoryDisk::new();
    let handler = handler_over(remote_storage(&src, &crops).with_max_crops(3));

    handler.handle("photos/cat-10x10.jpg", None).await.unwrap();
    handler.handle("photos/cat-20x20.jpg.webp", None).await.unwrap();
    handler.handle("photos/dog-10x10.jpg", None).await.unwrap();
    assert!(matches!(
        handler.handle("photos/cat-30x30.jpg", None).await,
        Err(CropError::QuotaExceeded { .. })
    ));

    let mut deleted = handler.store().delete_crops("photos/cat.jpg").await.unwrap();
    deleted.sort();
    assert_eq!(
        deleted,
        vec![
            "photos/cat-10x10.jpg",
            "photos/cat-20x20.jpg",
            "photos/cat-20x20.jpg.webp",
        ]
    );
    assert_eq!(crops.keys().await, vec!["photos/dog-10x10.jpg"]);

    // Forgotten keys are recomputed, and the budget has room again
    let response = handler.handle("photos/cat-10x10.jpg", None).await.unwrap();
    assert!(!response.cache_hit);
    handler.handle("photos/cat-30x30.jpg", None).await.unwrap();
}

#[tokio::test]
async fn test_purge_removes_orphans_only() {
    let src = MemoryDisk::new()
        .with_object("photos/cat.jpg", create_test_jpeg(100, 100))
        .with_object("photos/dog.jpg", create_test_jpeg(100, 100));
    let crops = MemoryDisk::new();
    let handler = handler_over(remote_storage(&src, &crops));

    handler.handle("photos/cat-10x10.jpg", None).await.unwrap();
    handler.handle("photos/dog-10x10.jpg.webp", None).await.unwrap();

    // The dog goes away
    src.delete("photos/dog.jpg").await.unwrap();

    let mut dry = handler.store().purge(true).await.unwrap();
    dry.sort();
    assert_eq!(
        dry,
        vec!["photos/dog-10x10.jpg", "photos/dog-10x10.jpg.webp"]
    );
    assert_eq!(crops.keys().await.len(), 3);

    let mut purged = handler.store().purge(false).await.unwrap();
    purged.sort();
    assert_eq!(purged, dry);
    assert_eq!(crops.keys().await, vec!["photos/cat-10x10.jpg"]);
}
