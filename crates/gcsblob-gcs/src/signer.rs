use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey};
use sha2::{Digest, Sha256};

use gcsblob_core::{SignedMethod, StorageError, StorageResult, UrlSigner};

use crate::credentials::ServiceAccountKey;

const SIGNING_ALGORITHM: &str = "GOOG4-RSA-SHA256";
const DEFAULT_HOST: &str = "storage.googleapis.com";
/// V4 signatures are valid for at most 7 days.
pub const MAX_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

/// Signs V4 query-string URLs with a service-account RSA key.
pub struct V4Signer {
    client_email: String,
    encoding_key: EncodingKey,
    scheme: String,
    host: String,
}

/// Intermediate values of a signature, exposed for inspection in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SigningParts {
    pub canonical_uri: String,
    pub canonical_query: String,
    pub canonical_request: String,
    pub string_to_sign: String,
}

impl V4Signer {
    pub fn new(key: &ServiceAccountKey) -> StorageResult<Self> {
        Ok(Self {
            client_email: key.client_email.clone(),
            encoding_key: key.encoding_key()?,
            scheme: "https".to_string(),
            host: DEFAULT_HOST.to_string(),
        })
    }

    pub fn from_key_file(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::new(&ServiceAccountKey::from_file(path)?)
    }

    /// Sign URLs for a different endpoint, e.g. `http://localhost:4443`.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        let (scheme, host) = endpoint
            .split_once("://")
            .unwrap_or(("https", endpoint));
        self.scheme = scheme.to_string();
        self.host = host.trim_end_matches('/').to_string();
        self
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Sign as of `now`. [`UrlSigner::sign`] uses the current time.
    pub fn sign_at(
        &self,
        bucket: &str,
        object: &str,
        duration: Duration,
        method: SignedMethod,
        headers: &[(String, String)],
        now: DateTime<Utc>,
    ) -> StorageResult<String> {
        let parts = self.signing_parts(bucket, object, duration, method, headers, now)?;
        let signature_b64 = jsonwebtoken::crypto::sign(
            parts.string_to_sign.as_bytes(),
            &self.encoding_key,
            Algorithm::RS256,
        )
        .map_err(|e| StorageError::Internal(format!("failed to sign url: {e}")))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| StorageError::Internal(format!("malformed signature: {e}")))?;

        Ok(format!(
            "{}://{}{}?{}&X-Goog-Signature={}",
            self.scheme,
            self.host,
            parts.canonical_uri,
            parts.canonical_query,
            hex::encode(signature)
        ))
    }

    pub(crate) fn signing_parts(
        &self,
        bucket: &str,
        object: &str,
        duration: Duration,
        method: SignedMethod,
        headers: &[(String, String)],
        now: DateTime<Utc>,
    ) -> StorageResult<SigningParts> {
        let expires = duration.as_secs();
        if expires == 0 || expires > MAX_EXPIRY_SECS {
            return Err(StorageError::InvalidArgument(format!(
                "signed url duration must be within 1..={MAX_EXPIRY_SECS} seconds, got {expires}"
            )));
        }

        let datetime = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{date}/auto/storage/goog4_request");

        let mut canonical_headers = BTreeMap::new();
        canonical_headers.insert("host".to_string(), self.host.clone());
        for (name, value) in headers {
            canonical_headers.insert(name.to_ascii_lowercase(), value.trim().to_string());
        }
        let signed_headers = canonical_headers
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(";");
        let header_block: String = canonical_headers
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect();

        let query = BTreeMap::from([
            ("X-Goog-Algorithm", SIGNING_ALGORITHM.to_string()),
            (
                "X-Goog-Credential",
                format!("{}/{}", self.client_email, scope),
            ),
            ("X-Goog-Date", datetime.clone()),
            ("X-Goog-Expires", expires.to_string()),
            ("X-Goog-SignedHeaders", signed_headers.clone()),
        ]);
        let canonical_query = query
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_uri = format!("/{bucket}/{}", encode_object_path(object));
        let canonical_request = [
            method.as_str(),
            canonical_uri.as_str(),
            canonical_query.as_str(),
            header_block.as_str(),
            signed_headers.as_str(),
            "UNSIGNED-PAYLOAD",
        ]
        .join("\n");

        let digest = hex::encode(Sha256::digest(canonical_request.as_bytes()));
        let string_to_sign = [
            SIGNING_ALGORITHM,
            datetime.as_str(),
            scope.as_str(),
            digest.as_str(),
        ]
        .join("\n");

        Ok(SigningParts {
            canonical_uri,
            canonical_query,
            canonical_request,
            string_to_sign,
        })
    }
}

impl UrlSigner for V4Signer {
    fn sign(
        &self,
        bucket: &str,
        object: &str,
        duration: Duration,
        method: SignedMethod,
        headers: &[(String, String)],
    ) -> StorageResult<String> {
        self.sign_at(bucket, object, duration, method, headers, Utc::now())
    }
}

/// Percent-encode each path segment, keeping the separators.
fn encode_object_path(object: &str) -> String {
    object
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
