use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;

use crate::error::{StorageError, StorageResult};

/// Longest validity a V4 signed URL may carry (7 days).
pub const MAX_SIGNED_URL_MINUTES: u32 = 7 * 24 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct GcsBlobConfig {
    pub bucket: BucketSettings,
    #[serde(default)]
    pub events: EventSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketSettings {
    pub bucket_name: String,
    #[serde(default)]
    pub use_signed_urls: bool,
    #[serde(default = "default_signed_url_duration")]
    pub signed_url_duration_minutes: u32,
    /// Path to a service-account JSON key. Required for signed URLs.
    #[serde(default)]
    pub service_account_key_path: Option<String>,
    /// Project that owns newly created buckets. Falls back to `GCP_PROJECT_ID`.
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// Client-side timeout for signed-URL transfers, in seconds.
    #[serde(default = "default_transfer_timeout")]
    pub transfer_timeout_secs: u64,
    /// Override for the JSON API endpoint, e.g. a local emulator.
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub use_console_publisher: bool,
    #[serde(default = "default_source_url")]
    pub source_url: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Event kinds to forward. `None` forwards every kind.
    #[serde(default)]
    pub kinds: Option<Vec<String>>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            use_console_publisher: false,
            source_url: default_source_url(),
            project_id: None,
            topic: default_topic(),
            queue_capacity: default_queue_capacity(),
            kinds: None,
            endpoint: None,
        }
    }
}

fn default_signed_url_duration() -> u32 {
    60
}

fn default_transfer_timeout() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_source_url() -> String {
    "https://cms.local".to_string()
}

fn default_topic() -> String {
    "cms".to_string()
}

fn default_queue_capacity() -> usize {
    1024
}

impl BucketSettings {
    /// Settings for `bucket_name` with every other field at its default.
    pub fn new(bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            use_signed_urls: false,
            signed_url_duration_minutes: default_signed_url_duration(),
            service_account_key_path: None,
            project_id: None,
            location: None,
            transfer_timeout_secs: default_transfer_timeout(),
            endpoint: None,
        }
    }

    pub fn validate(&self) -> StorageResult<()> {
        if self.bucket_name.trim().is_empty() {
            return Err(StorageError::Configuration(
                "bucket.bucket_name is required".to_string(),
            ));
        }
        if self.signed_url_duration_minutes == 0
            || self.signed_url_duration_minutes > MAX_SIGNED_URL_MINUTES
        {
            return Err(StorageError::Configuration(format!(
                "bucket.signed_url_duration_minutes must be within 1..={MAX_SIGNED_URL_MINUTES}"
            )));
        }
        if self.use_signed_urls && self.service_account_key_path.is_none() {
            return Err(StorageError::Configuration(
                "bucket.service_account_key_path is required when use_signed_urls is set"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Project for bucket creation: config, then `GCP_PROJECT_ID`, then a placeholder.
    pub fn resolved_project_id(&self) -> String {
        self.project_id
            .clone()
            .or_else(|| std::env::var("GCP_PROJECT_ID").ok())
            .unwrap_or_else(|| "default-project".to_string())
    }
}

impl GcsBlobConfig {
    pub fn load(path: &str) -> StorageResult<Self> {
        let config: Self = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("GCSBLOB_").split("__"))
            .extract()
            .map_err(|e| StorageError::Configuration(e.to_string()))?;
        config.bucket.validate()?;
        Ok(config)
    }
}
