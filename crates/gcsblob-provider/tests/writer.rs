use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use gcsblob_core::{BucketSettings, GuessMimeResolver, StorageError};
use gcsblob_provider::BlobProvider;
use gcsblob_test_utils::{
    MemoryObjectStore, TEST_BUCKET, create_signed_test_provider, create_test_provider,
};
use tokio::io::AsyncWriteExt;

/// Let spawned tasks run until `name` has been uploaded `expected` times.
async fn wait_for_uploads(store: &MemoryObjectStore, name: &str, expected: usize) {
    for _ in 0..200 {
        if store.upload_count(name) >= expected {
            return;
        }
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn nothing_uploaded_before_close() {
    let (provider, store) = create_test_provider();
    let blob = provider.get_blob("blob://default/media/clip.mp4").unwrap();
    let mut writer = blob.open_write();
    writer.write_all(b"frame one").await.unwrap();
    writer.write_all(b" frame two").await.unwrap();
    writer.flush().await.unwrap();

    assert_eq!(writer.len(), 19);
    assert_eq!(store.upload_count("media/clip.mp4"), 0);

    writer.close().await.unwrap();
    let stored = store.object(TEST_BUCKET, "media/clip.mp4").unwrap();
    assert_eq!(stored.data, Bytes::from_static(b"frame one frame two"));
    assert_eq!(stored.content_type.as_deref(), Some("video/mp4"));
}

#[tokio::test]
async fn close_twice_uploads_once() {
    let (provider, store) = create_test_provider();
    let blob = provider.get_blob("blob://default/media/a.txt").unwrap();
    let mut writer = blob.open_write();
    writer.write_all(b"once").await.unwrap();

    writer.close().await.unwrap();
    writer.close().await.unwrap();
    assert!(writer.is_closed());
    drop(writer);

    wait_for_uploads(&store, "media/a.txt", 2).await;
    assert_eq!(store.upload_count("media/a.txt"), 1);
}

#[tokio::test]
async fn shutdown_then_close_uploads_once() {
    let (provider, store) = create_test_provider();
    let blob = provider.get_blob("blob://default/media/b.txt").unwrap();
    let mut writer = blob.open_write();
    writer.write_all(b"via shutdown").await.unwrap();

    writer.shutdown().await.unwrap();
    writer.close().await.unwrap();
    writer.shutdown().await.unwrap();

    assert_eq!(store.upload_count("media/b.txt"), 1);
    let stored = store.object(TEST_BUCKET, "media/b.txt").unwrap();
    assert_eq!(stored.data, Bytes::from_static(b"via shutdown"));
}

#[tokio::test]
async fn drop_without_close_uploads_once() {
    let (provider, store) = create_test_provider();
    let blob = provider.get_blob("blob://default/media/c.txt").unwrap();
    {
        let mut writer = blob.open_write();
        writer.write_all(b"implicit").await.unwrap();
    }

    wait_for_uploads(&store, "media/c.txt", 1).await;
    assert_eq!(store.upload_count("media/c.txt"), 1);
    let stored = store.object(TEST_BUCKET, "media/c.txt").unwrap();
    assert_eq!(stored.data, Bytes::from_static(b"implicit"));
}

#[tokio::test]
async fn write_after_close_fails() {
    let (provider, _store) = create_test_provider();
    let blob = provider.get_blob("blob://default/media/d.txt").unwrap();
    let mut writer = blob.open_write();
    writer.close().await.unwrap();

    let err = writer.write_all(b"late").await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
}

#[tokio::test]
async fn empty_writer_still_uploads() {
    let (provider, store) = create_test_provider();
    let blob = provider.get_blob("blob://default/media/empty.bin").unwrap();
    let mut writer = blob.open_write();
    assert!(writer.is_empty());
    writer.close().await.unwrap();

    let stored = store.object(TEST_BUCKET, "media/empty.bin").unwrap();
    assert!(stored.data.is_empty());
}

#[tokio::test]
async fn failed_upload_is_not_retried_on_second_close() {
    // The store has no bucket, so the upload is rejected.
    let store = Arc::new(MemoryObjectStore::new());
    let provider = BlobProvider::new(
        BucketSettings::new(TEST_BUCKET),
        store.clone(),
        None,
        Arc::new(GuessMimeResolver),
    )
    .unwrap();
    let blob = provider.get_blob("blob://default/media/e.txt").unwrap();
    let mut writer = blob.open_write();
    writer.write_all(b"data").await.unwrap();

    let err = writer.close().await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
    writer.close().await.unwrap();
    assert_eq!(store.upload_count("media/e.txt"), 1);
}

#[tokio::test]
async fn cancelled_close_is_resumed_by_next_close() {
    let (provider, store, _server, _signer) = create_signed_test_provider().await;
    let blob = provider.get_blob("blob://default/media/x.txt").unwrap();
    let mut writer = blob.open_write();
    writer.write_all(b"payload").await.unwrap();

    // Poll once and abandon; the signed PUT is still in flight.
    let _ = writer.close().now_or_never();
    assert!(writer.is_closed());

    writer.close().await.unwrap();
    let stored = store.object(TEST_BUCKET, "media/x.txt").unwrap();
    assert_eq!(stored.data, Bytes::from_static(b"payload"));
    assert_eq!(store.upload_count("media/x.txt"), 1);
}

#[tokio::test]
async fn timed_out_close_still_commits() {
    let (provider, store, _server, _signer) = create_signed_test_provider().await;
    let blob = provider.get_blob("blob://default/media/y.txt").unwrap();
    let mut writer = blob.open_write();
    writer.write_all(b"late bytes").await.unwrap();

    let _ = tokio::time::timeout(std::time::Duration::from_nanos(1), writer.close()).await;
    writer.close().await.unwrap();

    assert_eq!(store.upload_count("media/y.txt"), 1);
    let stored = store.object(TEST_BUCKET, "media/y.txt").unwrap();
    assert_eq!(stored.data, Bytes::from_static(b"late bytes"));
}

#[tokio::test]
async fn drop_after_cancelled_close_finishes_upload() {
    let (provider, store, _server, _signer) = create_signed_test_provider().await;
    let blob = provider.get_blob("blob://default/media/z.txt").unwrap();
    let mut writer = blob.open_write();
    writer.write_all(b"handed off").await.unwrap();

    let _ = writer.close().now_or_never();
    drop(writer);

    for _ in 0..100 {
        if store.object(TEST_BUCKET, "media/z.txt").is_some() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let stored = store.object(TEST_BUCKET, "media/z.txt").unwrap();
    assert_eq!(stored.data, Bytes::from_static(b"handed off"));
    assert_eq!(store.upload_count("media/z.txt"), 1);
}

#[test]
fn drop_outside_runtime_discards_bytes() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (provider, store) = create_test_provider();
    let blob = provider.get_blob("blob://default/media/orphan.txt").unwrap();
    let mut writer = blob.open_write();
    runtime.block_on(writer.write_all(b"orphan")).unwrap();
    drop(runtime);

    drop(writer);
    assert_eq!(store.upload_count("media/orphan.txt"), 0);
    assert!(store.object(TEST_BUCKET, "media/orphan.txt").is_none());
}
