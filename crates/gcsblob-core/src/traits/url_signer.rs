use std::fmt;
use std::time::Duration;

use crate::error::StorageResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignedMethod {
    Get,
    Put,
}

impl SignedMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignedMethod::Get => "GET",
            SignedMethod::Put => "PUT",
        }
    }
}

impl fmt::Display for SignedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Produces time-limited URLs granting a single HTTP method on one object.
///
/// `headers` are request headers the URL is bound to; a client must send
/// them with exactly these values for the URL to be honoured.
pub trait UrlSigner: Send + Sync + 'static {
    fn sign(
        &self,
        bucket: &str,
        object: &str,
        duration: Duration,
        method: SignedMethod,
        headers: &[(String, String)],
    ) -> StorageResult<String>;
}
