pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{BucketSettings, EventSettings, GcsBlobConfig};
pub use error::{StorageError, StorageResult};
pub use traits::{GuessMimeResolver, MimeResolver, ObjectStoreClient, SignedMethod, UrlSigner};
pub use types::{BucketDescriptor, DEFAULT_CONTENT_TYPE, ObjectDescriptor, ObjectMetadata};
