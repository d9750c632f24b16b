pub mod mime_resolver;
pub mod object_store;
pub mod url_signer;

pub use mime_resolver::{GuessMimeResolver, MimeResolver};
pub use object_store::ObjectStoreClient;
pub use url_signer::{SignedMethod, UrlSigner};
