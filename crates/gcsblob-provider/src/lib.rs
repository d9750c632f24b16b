pub mod blob;
pub mod file_info;
pub mod identity;
pub mod labels;
pub mod provider;
pub mod signed;
pub mod writer;

pub use blob::Blob;
pub use file_info::FileInfo;
pub use identity::BlobIdentity;
pub use provider::BlobProvider;
pub use signed::SignedTransfer;
pub use writer::BlobWriter;
