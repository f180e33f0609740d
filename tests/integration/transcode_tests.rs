//! Secondary-format (WebP) tests.
//!
//! Tests verify:
//! - A `.webp` request leaves both the primary and the secondary crop behind
//! - The delivered content type is `image/webp`
//! - Existing secondaries are not re-encoded
//! - Without an encoder the suffix is inert
//! - Encoder failures never deliver the primary under the WebP type

use crop_streamer::codec::PathCodec;
use crop_streamer::crop::{CropHandler, Delivery};
use crop_streamer::error::CropError;
use crop_streamer::transcode::CwebpTranscoder;

use super::test_utils::{
    create_test_jpeg, local_storage, remote_storage, CountingEngine, FailingTranscoder,
    FakeTranscoder, MemoryDisk, FAKE_WEBP_MARKER,
};

fn source_disk() -> MemoryDisk {
    MemoryDisk::new().with_object("photos/cat.jpg", create_test_jpeg(400, 300))
}

#[tokio::test]
async fn test_webp_with_cached_primary_streams_webp() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("photos")).unwrap();
    let primary = create_test_jpeg(200, 100);
    std::fs::write(dir.path().join("photos/cat.jpg-200x100.jpg"), &primary).unwrap();

    let src = source_disk();
    let engine = CountingEngine::new();
    let transcoder = FakeTranscoder::new();
    let handler = CropHandler::new(PathCodec::new("/"), local_storage(&src, dir.path()))
        .with_engine(engine.clone())
        .with_transcoder(transcoder.clone());

    let response = handler
        .handle("photos/cat.jpg-200x100.webp", None)
        .await
        .unwrap();

    assert_eq!(response.delivery.status().as_u16(), 200);
    let Delivery::Stream { path, content_type } = response.delivery else {
        panic!("expected a stream");
    };
    assert_eq!(content_type, Some("image/webp"));
    assert!(path.to_string_lossy().ends_with(".webp"));
    assert_eq!(path, dir.path().join("photos/cat.jpg-200x100.jpg.webp"));

    let secondary = std::fs::read(&path).unwrap();
    assert!(secondary.starts_with(FAKE_WEBP_MARKER));
    assert_eq!(&secondary[FAKE_WEBP_MARKER.len()..], primary.as_slice());

    // The primary already existed: no source read, no transform
    assert_eq!(src.read_count(), 0);
    assert_eq!(engine.calls(), 0);
    assert_eq!(transcoder.calls(), 1);

    // The encoder ran on the cached primary inside the crops directory
    let invocations = transcoder.invocations().await;
    assert_eq!(invocations[0].0, dir.path().join("photos/cat.jpg-200x100.jpg"));
    assert_eq!(invocations[0].1, dir.path());
}

#[tokio::test]
async fn test_webp_miss_creates_primary_and_secondary() {
    let dir = tempfile::tempdir().unwrap();
    let src = source_disk();
    let engine = CountingEngine::new();
    let transcoder = FakeTranscoder::new();
    let handler = CropHandler::new(PathCodec::new("/"), local_storage(&src, dir.path()))
        .with_engine(engine.clone())
        .with_transcoder(transcoder.clone());

    let response = handler
        .handle("photos/cat-64x64.jpg.webp", None)
        .await
        .unwrap();
    assert_eq!(response.key, "photos/cat-64x64.jpg.webp");
    assert!(!response.cache_hit);

    assert!(dir.path().join("photos/cat-64x64.jpg").is_file());
    assert!(dir.path().join("photos/cat-64x64.jpg.webp").is_file());
    assert_eq!(engine.calls(), 1);
    assert_eq!(transcoder.calls(), 1);
}

#[tokio::test]
async fn test_existing_secondary_is_not_reencoded() {
    let dir = tempfile::tempdir().unwrap();
    let src = source_disk();
    let transcoder = FakeTranscoder::new();
    let handler = CropHandler::new(PathCodec::new("/"), local_storage(&src, dir.path()))
        .with_transcoder(transcoder.clone());

    handler
        .handle("photos/cat-64x64.jpg.webp", None)
        .await
        .unwrap();
    let response = handler
        .handle("photos/cat-64x64.jpg.webp", None)
        .await
        .unwrap();

    assert!(response.cache_hit);
    assert_eq!(transcoder.calls(), 1);
}

#[tokio::test]
async fn test_webp_suffix_is_inert_without_encoder() {
    let dir = tempfile::tempdir().unwrap();
    let src = source_disk();
    let handler = CropHandler::new(PathCodec::new("/"), local_storage(&src, dir.path()));
    assert!(!handler.transcoding_enabled());

    let with_suffix = handler
        .handle("photos/cat.jpg-200x100.webp", None)
        .await
        .unwrap();
    let without_suffix = handler
        .handle("photos/cat.jpg-200x100.jpg", None)
        .await
        .unwrap();

    assert_eq!(with_suffix.key, without_suffix.key);
    assert_eq!(with_suffix.delivery, without_suffix.delivery);
    let Delivery::Stream { content_type, .. } = with_suffix.delivery else {
        panic!("expected a stream");
    };
    assert_eq!(content_type, Some("image/jpeg"));
    assert!(!dir.path().join("photos/cat.jpg-200x100.jpg.webp").exists());
}

#[tokio::test]
async fn test_encoder_failure_is_surfaced() {
    let dir = tempfile::tempdir().unwrap();
    let src = source_disk();
    let handler = CropHandler::new(PathCodec::new("/"), local_storage(&src, dir.path()))
        .with_transcoder(FailingTranscoder);

    let err = handler
        .handle("photos/cat-64x64.jpg.webp", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CropError::Transcode(_)));

    // The primary is kept, no secondary is published
    assert!(dir.path().join("photos/cat-64x64.jpg").is_file());
    assert!(!dir.path().join("photos/cat-64x64.jpg.webp").exists());
}

#[tokio::test]
async fn test_new_secondary_respects_crop_budget() {
    let src = source_disk();
    let crops = MemoryDisk::new().with_object("photos/cat-10x10.jpg", create_test_jpeg(10, 10));
    let transcoder = FakeTranscoder::new();
    let handler = CropHandler::new(
        PathCodec::new("/").with_public_url("https://cdn.example.com"),
        remote_storage(&src, &crops).with_max_crops(1),
    )
    .with_transcoder(transcoder.clone());

    let err = handler
        .handle("photos/cat-20x20.jpg", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CropError::QuotaExceeded { .. }));

    let err = handler
        .handle("photos/cat-10x10.jpg.webp", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CropError::QuotaExceeded { ref source_path } if source_path == "photos/cat.jpg"
    ));
    assert_eq!(transcoder.calls(), 0);
    assert_eq!(crops.keys().await, vec!["photos/cat-10x10.jpg"]);

    // The primary is still served
    let response = handler.handle("photos/cat-10x10.jpg", None).await.unwrap();
    assert!(response.cache_hit);
}

#[tokio::test]
async fn test_existing_secondary_is_served_over_budget() {
    let src = source_disk();
    let crops = MemoryDisk::new()
        .with_object("photos/cat-10x10.jpg", create_test_jpeg(10, 10))
        .with_object("photos/cat-10x10.jpg.webp", b"webp".to_vec());
    let transcoder = FakeTranscoder::new();
    let handler = CropHandler::new(
        PathCodec::new("/").with_public_url("https://cdn.example.com"),
        remote_storage(&src, &crops).with_max_crops(1),
    )
    .with_transcoder(transcoder.clone());

    let response = handler
        .handle("photos/cat-10x10.jpg.webp", None)
        .await
        .unwrap();
    assert!(response.cache_hit);
    assert_eq!(transcoder.calls(), 0);
}

#[tokio::test]
async fn test_remote_webp_is_staged_and_redirected() {
    let src = source_disk();
    let crops = MemoryDisk::new();
    let transcoder = FakeTranscoder::new();
    let handler = CropHandler::new(
        PathCodec::new("/").with_public_url("https://cdn.example.com"),
        remote_storage(&src, &crops),
    )
    .with_transcoder(transcoder.clone());

    let response = handler
        .handle("photos/cat.jpg-32x32.png.webp", None)
        .await
        .unwrap();

    assert_eq!(
        response.delivery,
        Delivery::Redirect {
            url: "https://cdn.example.com/photos/cat.jpg-32x32.png.webp".to_string()
        }
    );

    let primary = crops.get("photos/cat.jpg-32x32.png").await.unwrap();
    let secondary = crops.get("photos/cat.jpg-32x32.png.webp").await.unwrap();
    assert!(secondary.starts_with(FAKE_WEBP_MARKER));
    assert_eq!(&secondary[FAKE_WEBP_MARKER.len()..], &primary[..]);

    // The staging directory is gone once the request completes
    let invocations = transcoder.invocations().await;
    assert!(!invocations[0].1.exists());
}

#[tokio::test]
async fn test_webp_respects_token_on_suffixed_path() {
    let dir = tempfile::tempdir().unwrap();
    let src = source_disk();
    let codec = PathCodec::new("/").with_signing_key("secret");
    let token = codec.signing_token("photos/cat-64x64.jpg.webp").unwrap();
    let transcoder = FakeTranscoder::new();
    let handler = CropHandler::new(codec, local_storage(&src, dir.path()))
        .with_transcoder(transcoder.clone());

    let err = handler
        .handle("photos/cat-64x64.jpg.webp", Some("wrong"))
        .await
        .unwrap_err();
    assert!(matches!(err, CropError::TokenMismatch));
    assert_eq!(transcoder.calls(), 0);

    handler
        .handle("photos/cat-64x64.jpg.webp", Some(&token))
        .await
        .unwrap();
    assert_eq!(transcoder.calls(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_external_encoder_process() {
    let bin = tempfile::tempdir().unwrap();
    let encoder = super::test_utils::write_fake_cwebp(bin.path());

    let dir = tempfile::tempdir().unwrap();
    let src = source_disk();
    let handler = CropHandler::new(PathCodec::new("/"), local_storage(&src, dir.path()))
        .with_transcoder(CwebpTranscoder::new(&encoder, 80));

    let response = handler
        .handle("photos/cat.jpg-120x90.webp", None)
        .await
        .unwrap();

    let Delivery::Stream { path, content_type } = response.delivery else {
        panic!("expected a stream");
    };
    assert_eq!(content_type, Some("image/webp"));

    let primary = std::fs::read(dir.path().join("photos/cat.jpg-120x90.jpg")).unwrap();
    let secondary = std::fs::read(path).unwrap();
    assert!(secondary.starts_with(FAKE_WEBP_MARKER));
    assert_eq!(&secondary[FAKE_WEBP_MARKER.len()..], primary.as_slice());
}

#[cfg(unix)]
#[tokio::test]
async fn test_missing_encoder_binary_fails_request() {
    let dir = tempfile::tempdir().unwrap();
    let src = source_disk();
    let handler = CropHandler::new(PathCodec::new("/"), local_storage(&src, dir.path()))
        .with_transcoder(CwebpTranscoder::new(dir.path().join("no-cwebp"), 80));

    let err = handler
        .handle("photos/cat.jpg-120x90.webp", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CropError::Transcode(_)));
    assert!(!dir.path().join("photos/cat.jpg-120x90.jpg.webp").exists());
}
