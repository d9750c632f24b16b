use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use gcsblob_core::{BucketSettings, StorageError, StorageResult};

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// The fields of a service-account JSON key that the client uses.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<hidden>")
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_file(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            StorageError::Configuration(format!(
                "failed to read service account key {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> StorageResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| StorageError::Configuration(format!("invalid service account key: {e}")))
    }

    pub fn encoding_key(&self) -> StorageResult<EncodingKey> {
        EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| StorageError::Configuration(format!("invalid service account private key: {e}")))
    }
}

/// Supplies bearer tokens for Google API calls.
#[async_trait]
pub trait TokenSource: Send + Sync + 'static {
    /// `None` means requests go out unauthenticated.
    async fn token(&self) -> StorageResult<Option<String>>;
}

/// No credentials; for emulators and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

#[async_trait]
impl TokenSource for NoAuth {
    async fn token(&self) -> StorageResult<Option<String>> {
        Ok(None)
    }
}

/// A pre-issued access token.
#[derive(Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> StorageResult<Option<String>> {
        Ok(Some(self.0.clone()))
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Exchanges a signed JWT assertion for an OAuth access token and caches it
/// until shortly before expiry.
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scope: String,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(key: ServiceAccountKey) -> StorageResult<Self> {
        let encoding_key = key.encoding_key()?;
        Ok(Self {
            key,
            encoding_key,
            scope: CLOUD_PLATFORM_SCOPE.to_string(),
            http: reqwest::Client::new(),
            cached: Mutex::new(None),
        })
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn key(&self) -> &ServiceAccountKey {
        &self.key
    }

    /// The signed JWT sent to the token endpoint.
    pub fn assertion(&self, now: DateTime<Utc>) -> StorageResult<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| StorageError::Internal(format!("failed to sign token assertion: {e}")))
    }

    async fn fetch(&self) -> StorageResult<CachedToken> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;
        let resp = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| StorageError::Storage(format!("token request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::Storage(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| StorageError::Storage(format!("invalid token response: {e}")))?;
        tracing::debug!(account = %self.key.client_email, expires_in = token.expires_in, "fetched access token");
        Ok(CachedToken {
            value: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn token(&self) -> StorageResult<Option<String>> {
        let mut cached = self.cached.lock().await;
        let margin = Duration::seconds(EXPIRY_MARGIN_SECS);
        if let Some(token) = cached.as_ref() {
            if token.expires_at - margin > Utc::now() {
                return Ok(Some(token.value.clone()));
            }
        }
        let fresh = self.fetch().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(Some(value))
    }
}

/// Pick credentials for `settings`. The configured key path wins, then
/// `GOOGLE_APPLICATION_CREDENTIALS`, then `GOOGLE_OAUTH_ACCESS_TOKEN`.
/// With none of those, requests go out unauthenticated.
pub fn token_source_from_settings(settings: &BucketSettings) -> StorageResult<Arc<dyn TokenSource>> {
    let key_path = settings
        .service_account_key_path
        .clone()
        .or_else(|| std::env::var("GOOGLE_APPLICATION_CREDENTIALS").ok());
    if let Some(path) = key_path {
        let key = ServiceAccountKey::from_file(&path)?;
        return Ok(Arc::new(ServiceAccountTokenSource::new(key)?));
    }
    if let Ok(token) = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN") {
        return Ok(Arc::new(StaticToken(token)));
    }
    tracing::warn!("no google credentials configured; requests will be unauthenticated");
    Ok(Arc::new(NoAuth))
}
