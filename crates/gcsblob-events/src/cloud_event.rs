use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::kinds::{ContentEvent, ContentEventKind};

pub const SPEC_VERSION: &str = "1.0.1";
pub const DATA_CONTENT_TYPE: &str = "application/json";
pub const DEFAULT_LANGUAGE: &str = "en";
const UNKNOWN: &str = "Unknown";

/// Envelope published for every content event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudEvent {
    pub spec_version: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    pub subject: String,
    pub id: String,
    pub time: DateTime<Utc>,
    pub data_content_type: String,
    pub data: ContentEventData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentEventData {
    pub content_link: Option<String>,
    pub content_guid: String,
    pub name: String,
    pub content_type: String,
    pub language: String,
    pub url: Option<String>,
    pub modified_date: Option<DateTime<Utc>>,
    pub content_id: Option<i64>,
}

impl CloudEvent {
    pub fn event_type_for(kind: ContentEventKind) -> String {
        format!("com.youversionapi.cms.content.{}.v1", kind.as_str())
    }

    /// Message attributes carried next to the data payload.
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![
            ("specversion", self.spec_version.clone()),
            ("type", self.event_type.clone()),
            ("source", self.source.clone()),
            ("subject", self.subject.clone()),
            ("id", self.id.clone()),
            ("time", self.time.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            ("datacontenttype", self.data_content_type.clone()),
        ]
    }
}

/// Stamps events with the configured source.
#[derive(Debug, Clone)]
pub struct CloudEventFactory {
    source: String,
}

impl CloudEventFactory {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn build(&self, kind: ContentEventKind, event: &ContentEvent) -> CloudEvent {
        self.build_at(kind, event, Utc::now())
    }

    pub fn build_at(
        &self,
        kind: ContentEventKind,
        event: &ContentEvent,
        now: DateTime<Utc>,
    ) -> CloudEvent {
        let content = event.content.as_ref().filter(|_| kind.carries_content());
        let guid = content.map(|c| c.guid).unwrap_or(Uuid::nil()).to_string();

        let data = ContentEventData {
            content_link: event.content_link.clone(),
            content_guid: guid.clone(),
            name: content.map_or(UNKNOWN, |c| c.name.as_str()).to_string(),
            content_type: content
                .map_or(UNKNOWN, |c| c.content_type.as_str())
                .to_string(),
            language: content
                .and_then(|c| c.language.clone())
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            url: content.and_then(|c| c.url.clone()),
            modified_date: Some(content.and_then(|c| c.modified).unwrap_or(now)),
            content_id: event.content_id,
        };

        CloudEvent {
            spec_version: SPEC_VERSION.to_string(),
            event_type: CloudEvent::event_type_for(kind),
            source: self.source.clone(),
            subject: event.content_link.clone().unwrap_or(guid),
            id: Uuid::new_v4().to_string(),
            time: now,
            data_content_type: DATA_CONTENT_TYPE.to_string(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::ContentSnapshot;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap()
    }

    fn snapshot() -> ContentSnapshot {
        ContentSnapshot {
            guid: Uuid::parse_str("6f2c1a54-5a0f-4d7e-9a53-1d2a3c4b5e6f").unwrap(),
            name: "Start page".to_string(),
            content_type: "StartPage".to_string(),
            language: Some("sv".to_string()),
            url: Some("/en/".to_string()),
            modified: Some(Utc.with_ymd_and_hms(2024, 5, 30, 12, 0, 0).unwrap()),
        }
    }

    #[test]
    fn envelope_fields() {
        let factory = CloudEventFactory::new("https://cms.example");
        let event = ContentEvent::new("42_7", 42).with_content(snapshot());
        let ce = factory.build_at(ContentEventKind::Published, &event, now());

        assert_eq!(ce.spec_version, "1.0.1");
        assert_eq!(ce.event_type, "com.youversionapi.cms.content.published.v1");
        assert_eq!(ce.source, "https://cms.example");
        assert_eq!(ce.subject, "42_7");
        assert_eq!(ce.data_content_type, "application/json");
        assert!(Uuid::parse_str(&ce.id).is_ok());
        assert_eq!(ce.data.name, "Start page");
        assert_eq!(ce.data.language, "sv");
        assert_eq!(ce.data.content_id, Some(42));
        assert_eq!(ce.data.modified_date, snapshot().modified);
    }

    #[test]
    fn delete_events_drop_content() {
        let factory = CloudEventFactory::new("https://cms.local");
        let event = ContentEvent::new("42", 42).with_content(snapshot());
        let ce = factory.build_at(ContentEventKind::Deleted, &event, now());

        assert_eq!(ce.data.name, "Unknown");
        assert_eq!(ce.data.content_type, "Unknown");
        assert_eq!(ce.data.content_guid, Uuid::nil().to_string());
        assert_eq!(ce.data.language, "en");
        assert_eq!(ce.data.modified_date, Some(now()));
    }

    #[test]
    fn subject_falls_back_to_guid() {
        let factory = CloudEventFactory::new("https://cms.local");
        let event = ContentEvent {
            content_link: None,
            content_id: None,
            content: Some(snapshot()),
        };
        let ce = factory.build_at(ContentEventKind::Saved, &event, now());
        assert_eq!(ce.subject, "6f2c1a54-5a0f-4d7e-9a53-1d2a3c4b5e6f");
    }

    #[test]
    fn serializes_camel_case() {
        let factory = CloudEventFactory::new("https://cms.local");
        let ce = factory.build_at(ContentEventKind::Created, &ContentEvent::new("1", 1), now());
        let json = serde_json::to_value(&ce).unwrap();

        assert_eq!(json["specVersion"], "1.0.1");
        assert_eq!(json["type"], "com.youversionapi.cms.content.created.v1");
        assert_eq!(json["dataContentType"], "application/json");
        assert_eq!(json["data"]["contentLink"], "1");
        assert_eq!(json["data"]["contentId"], 1);
        assert!(json["data"]["url"].is_null());
    }

    #[test]
    fn attribute_time_has_second_precision() {
        let factory = CloudEventFactory::new("https://cms.local");
        let ce = factory.build_at(ContentEventKind::Moved, &ContentEvent::new("3", 3), now());
        let attrs = ce.attributes();
        assert!(attrs.contains(&("time", "2024-06-01T08:30:00Z".to_string())));
        assert!(attrs.contains(&("specversion", "1.0.1".to_string())));
        assert_eq!(attrs.len(), 7);
    }
}
