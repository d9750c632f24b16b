use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use gcsblob_core::EventSettings;
use gcsblob_gcs::TokenSource;

use crate::cloud_event::CloudEvent;
use crate::error::{EventError, EventResult};

pub const DEFAULT_PUBSUB_ENDPOINT: &str = "https://pubsub.googleapis.com";

/// Delivers a finished envelope somewhere. Returns the message id.
#[async_trait]
pub trait Publisher: Send + Sync + 'static {
    async fn publish(&self, event: &CloudEvent) -> EventResult<String>;
}

/// Writes events to the log instead of a topic.
#[derive(Debug, Default, Clone)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, event: &CloudEvent) -> EventResult<String> {
        let json = serde_json::to_string_pretty(event)
            .map_err(|e| EventError::Serialization(e.to_string()))?;
        tracing::info!(event_type = %event.event_type, "content event");
        tracing::info!("event data:\n{json}");
        Ok(event.id.clone())
    }
}

/// Publishes to a Pub/Sub topic over the REST API.
pub struct PubSubPublisher {
    publish_url: String,
    http: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
}

#[derive(Serialize)]
struct PublishRequest {
    messages: Vec<PubSubMessage>,
}

#[derive(Serialize)]
struct PubSubMessage {
    data: String,
    attributes: BTreeMap<&'static str, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

impl PubSubPublisher {
    pub fn new(
        endpoint: Option<&str>,
        project_id: &str,
        topic: &str,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        let base = endpoint
            .unwrap_or(DEFAULT_PUBSUB_ENDPOINT)
            .trim_end_matches('/');
        Self {
            publish_url: format!("{base}/v1/projects/{project_id}/topics/{topic}:publish"),
            http: reqwest::Client::new(),
            tokens,
        }
    }

    pub fn publish_url(&self) -> &str {
        &self.publish_url
    }
}

#[async_trait]
impl Publisher for PubSubPublisher {
    async fn publish(&self, event: &CloudEvent) -> EventResult<String> {
        let data = serde_json::to_vec(&event.data)
            .map_err(|e| EventError::Serialization(e.to_string()))?;
        let body = PublishRequest {
            messages: vec![PubSubMessage {
                data: STANDARD.encode(data),
                attributes: event.attributes().into_iter().collect(),
            }],
        };

        let mut request = self.http.post(&self.publish_url).json(&body);
        let token = self
            .tokens
            .token()
            .await
            .map_err(|e| EventError::Publish(e.to_string()))?;
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| EventError::Publish(format!("{}: {e}", self.publish_url)))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(EventError::Publish(format!(
                "pubsub returned {status}: {text}"
            )));
        }
        let parsed: PublishResponse = resp
            .json()
            .await
            .map_err(|e| EventError::Publish(format!("invalid publish response: {e}")))?;
        let id = parsed
            .message_ids
            .into_iter()
            .next()
            .ok_or_else(|| EventError::Publish("publish response had no message id".to_string()))?;
        tracing::info!(event_type = %event.event_type, message_id = %id, "published to pubsub");
        Ok(id)
    }
}

/// Pick the publisher the settings ask for. Without a project id the
/// Pub/Sub path is unusable, so events go to the log.
pub fn publisher_from_settings(
    settings: &EventSettings,
    tokens: Arc<dyn TokenSource>,
) -> Arc<dyn Publisher> {
    if settings.use_console_publisher {
        return Arc::new(LogPublisher);
    }
    match settings.project_id.as_deref().filter(|p| !p.is_empty()) {
        Some(project) => {
            tracing::info!(project, topic = %settings.topic, "pubsub publisher initialized");
            Arc::new(PubSubPublisher::new(
                settings.endpoint.as_deref(),
                project,
                &settings.topic,
                tokens,
            ))
        }
        None => {
            tracing::warn!("no pubsub project configured; content events will be logged");
            Arc::new(LogPublisher)
        }
    }
}
