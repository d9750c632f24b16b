pub mod client;
pub mod credentials;
pub mod signer;

pub use client::{DEFAULT_ENDPOINT, GcsClient};
pub use credentials::{
    NoAuth, ServiceAccountKey, ServiceAccountTokenSource, StaticToken, TokenSource,
    token_source_from_settings,
};
pub use signer::V4Signer;
