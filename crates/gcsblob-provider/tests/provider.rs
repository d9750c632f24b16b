use std::sync::Arc;

use gcsblob_core::config::MAX_SIGNED_URL_MINUTES;
use gcsblob_core::{BucketSettings, GuessMimeResolver, StorageError};
use gcsblob_provider::BlobProvider;
use gcsblob_test_utils::{MemoryObjectStore, TEST_BUCKET, create_test_provider};

fn provider_without_bucket() -> (BlobProvider, Arc<MemoryObjectStore>) {
    let store = Arc::new(MemoryObjectStore::new());
    let mut settings = BucketSettings::new("fresh-bucket");
    settings.project_id = Some("test-project".to_string());
    settings.location = Some("EU".to_string());
    let provider =
        BlobProvider::new(settings, store.clone(), None, Arc::new(GuessMimeResolver)).unwrap();
    (provider, store)
}

#[tokio::test]
async fn get_blob_rejects_relative_uri() {
    let (provider, _store) = create_test_provider();
    let err = provider.get_blob("docs/readme.txt").unwrap_err();
    assert!(matches!(err, StorageError::InvalidArgument(_)));
}

#[tokio::test]
async fn get_blob_rejects_uri_without_object() {
    let (provider, _store) = create_test_provider();
    for uri in ["blob://default/", "blob://default"] {
        let err = provider.get_blob(uri).unwrap_err();
        assert!(matches!(err, StorageError::InvalidArgument(_)), "{uri} accepted");
    }
}

#[tokio::test]
async fn get_blob_maps_path_to_object_name() {
    let (provider, _store) = create_test_provider();
    let blob = provider.get_blob("blob://default/a/b/c.txt").unwrap();
    assert_eq!(blob.object_name(), "a/b/c.txt");
    assert_eq!(blob.bucket(), TEST_BUCKET);
    assert_eq!(blob.content_type(), Some("text/plain"));
}

#[tokio::test]
async fn get_blob_returns_fresh_instances() {
    let (provider, _store) = create_test_provider();
    let mut first = provider.get_blob("blob://default/a/b.txt").unwrap();
    first.set_content_type("application/json");
    let second = provider.get_blob("blob://default/a/b.txt").unwrap();
    assert_eq!(second.content_type(), Some("text/plain"));
}

#[tokio::test]
async fn create_blob_names_object_inside_container() {
    let (provider, _store) = create_test_provider();
    let blob = provider.create_blob("blob://default/uploads", ".png").unwrap();
    assert!(blob.object_name().starts_with("uploads/"));
    assert!(blob.object_name().ends_with(".png"));
    assert_eq!(blob.content_type(), Some("image/png"));

    let other = provider.create_blob("blob://default/uploads", ".png").unwrap();
    assert_ne!(blob.object_name(), other.object_name());
}

#[tokio::test]
async fn create_if_not_exist_creates_bucket_with_labels() {
    let (provider, store) = provider_without_bucket();
    assert!(provider.create_if_not_exist().await.unwrap());

    let created = store.created_buckets();
    assert_eq!(created.len(), 1);
    let (project, bucket) = &created[0];
    assert_eq!(project, "test-project");
    assert_eq!(bucket.name, "fresh-bucket");
    assert_eq!(bucket.location.as_deref(), Some("EU"));
    assert_eq!(bucket.labels.len(), 2);
    assert!(bucket.labels.contains_key("episervergcpcreateddate"));
    assert!(bucket.labels.contains_key("episervergcpcreatedbymachine"));
    for (key, value) in &bucket.labels {
        for label in [key, value] {
            assert!(label.len() <= 63);
            assert!(
                label
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
            );
        }
    }
}

#[tokio::test]
async fn create_if_not_exist_is_idempotent() {
    let (provider, store) = provider_without_bucket();
    assert!(provider.create_if_not_exist().await.unwrap());
    assert!(!provider.create_if_not_exist().await.unwrap());
    assert_eq!(store.created_buckets().len(), 1);
}

#[tokio::test]
async fn create_if_not_exist_leaves_existing_bucket_alone() {
    let (provider, store) = create_test_provider();
    assert!(!provider.create_if_not_exist().await.unwrap());
    assert!(store.created_buckets().is_empty());
}

#[tokio::test]
async fn delete_single_object() {
    let (provider, store) = create_test_provider();
    store.insert(TEST_BUCKET, "images/a.png", b"a");
    store.insert(TEST_BUCKET, "images/b.png", b"b");

    provider.delete("blob://default/images/a.png").await.unwrap();
    assert_eq!(store.object_names(TEST_BUCKET), vec!["images/b.png"]);
}

#[tokio::test]
async fn delete_missing_single_object_succeeds() {
    let (provider, _store) = create_test_provider();
    provider.delete("blob://default/images/none.png").await.unwrap();
}

#[tokio::test]
async fn delete_prefix_does_not_match_siblings() {
    let (provider, store) = create_test_provider();
    store.insert(TEST_BUCKET, "a/1", b"1");
    store.insert(TEST_BUCKET, "a/2", b"2");
    store.insert(TEST_BUCKET, "ab/3", b"3");

    provider.delete("blob://default/a").await.unwrap();
    assert_eq!(store.object_names(TEST_BUCKET), vec!["ab/3"]);
}

#[tokio::test]
async fn delete_prefix_with_trailing_slash() {
    let (provider, store) = create_test_provider();
    store.insert(TEST_BUCKET, "images/x/1.png", b"1");
    store.insert(TEST_BUCKET, "images2/1.png", b"2");

    provider.delete("blob://default/images/").await.unwrap();
    assert_eq!(store.object_names(TEST_BUCKET), vec!["images2/1.png"]);
}

#[tokio::test]
async fn delete_by_prefix_counts_deletions() {
    let (provider, store) = create_test_provider();
    store.insert(TEST_BUCKET, "logs/1", b"1");
    store.insert(TEST_BUCKET, "logs/2", b"2");
    assert_eq!(provider.delete_by_prefix("logs").await.unwrap(), 2);
    assert_eq!(provider.delete_by_prefix("logs").await.unwrap(), 0);
}

#[tokio::test]
async fn delete_prefix_stops_at_first_failure() {
    let (provider, store) = create_test_provider();
    store.insert(TEST_BUCKET, "p/1", b"1");
    store.insert(TEST_BUCKET, "p/2", b"2");
    store.insert(TEST_BUCKET, "p/3", b"3");
    store.fail_deletes_of("p/2");

    let err = provider.delete("blob://default/p").await.unwrap_err();
    assert!(matches!(err, StorageError::Storage(_)));
    // p/1 stays deleted, p/3 was never attempted.
    assert_eq!(store.object_names(TEST_BUCKET), vec!["p/2", "p/3"]);
    assert_eq!(store.delete_calls(), vec!["p/1", "p/2"]);
}

#[tokio::test]
async fn delete_without_container_is_invalid() {
    let (provider, _store) = create_test_provider();
    let err = provider.delete("blob://default/").await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidArgument(_)));
}

#[tokio::test]
async fn delete_rejects_relative_uri() {
    let (provider, _store) = create_test_provider();
    let err = provider.delete("images").await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidArgument(_)));
}

#[test]
fn signed_mode_requires_signer() {
    let mut settings = BucketSettings::new(TEST_BUCKET);
    settings.use_signed_urls = true;
    let result = BlobProvider::new(
        settings,
        Arc::new(MemoryObjectStore::new()),
        None,
        Arc::new(GuessMimeResolver),
    );
    assert!(matches!(result, Err(StorageError::Configuration(_))));
}

#[test]
fn empty_bucket_name_rejected() {
    let result = BlobProvider::new(
        BucketSettings::new(""),
        Arc::new(MemoryObjectStore::new()),
        None,
        Arc::new(GuessMimeResolver),
    );
    assert!(matches!(result, Err(StorageError::Configuration(_))));
}

#[test]
fn signed_url_duration_out_of_range_rejected() {
    for minutes in [0, MAX_SIGNED_URL_MINUTES + 1] {
        let mut settings = BucketSettings::new(TEST_BUCKET);
        settings.signed_url_duration_minutes = minutes;
        let result = BlobProvider::new(
            settings,
            Arc::new(MemoryObjectStore::new()),
            None,
            Arc::new(GuessMimeResolver),
        );
        assert!(
            matches!(result, Err(StorageError::Configuration(_))),
            "{minutes} minutes accepted"
        );
    }

    let mut settings = BucketSettings::new(TEST_BUCKET);
    settings.signed_url_duration_minutes = MAX_SIGNED_URL_MINUTES;
    assert!(
        BlobProvider::new(
            settings,
            Arc::new(MemoryObjectStore::new()),
            None,
            Arc::new(GuessMimeResolver),
        )
        .is_ok()
    );
}
