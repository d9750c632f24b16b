use std::sync::Arc;

use gcsblob_core::{BucketSettings, GuessMimeResolver, UrlSigner};
use gcsblob_provider::BlobProvider;

use crate::memory::MemoryObjectStore;
use crate::signed_server::{LoopbackSigner, SignedUrlServer};

pub const TEST_BUCKET: &str = "test-bucket";

/// A direct-mode provider over a fresh in-memory bucket.
pub fn create_test_provider() -> (BlobProvider, Arc<MemoryObjectStore>) {
    let store = Arc::new(MemoryObjectStore::with_bucket(TEST_BUCKET));
    let provider = BlobProvider::new(
        BucketSettings::new(TEST_BUCKET),
        store.clone(),
        None,
        Arc::new(GuessMimeResolver),
    )
    .expect("failed to build test provider");
    (provider, store)
}

/// A signed-URL provider whose transfers go through a loopback server.
pub async fn create_signed_test_provider() -> (
    BlobProvider,
    Arc<MemoryObjectStore>,
    SignedUrlServer,
    Arc<LoopbackSigner>,
) {
    let store = Arc::new(MemoryObjectStore::with_bucket(TEST_BUCKET));
    let server = SignedUrlServer::start(store.clone()).await;
    let signer = server.signer();

    let mut settings = BucketSettings::new(TEST_BUCKET);
    settings.use_signed_urls = true;
    settings.transfer_timeout_secs = 10;

    let provider = BlobProvider::new(
        settings,
        store.clone(),
        Some(signer.clone() as Arc<dyn UrlSigner>),
        Arc::new(GuessMimeResolver),
    )
    .expect("failed to build signed test provider");
    (provider, store, server, signer)
}
