pub mod memory;
pub mod provider;
pub mod signed_server;

pub use memory::{MemoryObjectStore, StoredObject};
pub use provider::{TEST_BUCKET, create_signed_test_provider, create_test_provider};
pub use signed_server::{LoopbackSigner, RecordedRequest, SignRequest, SignedUrlServer};
