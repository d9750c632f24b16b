use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::EventError;

/// Content lifecycle notifications, in before/after pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentEventKind {
    Created,
    Creating,
    Saved,
    Saving,
    Published,
    Publishing,
    Deleted,
    Deleting,
    Moved,
    Moving,
    CheckedIn,
    CheckingIn,
    CheckedOut,
    CheckingOut,
    Rejected,
    Rejecting,
}

impl ContentEventKind {
    pub const ALL: [ContentEventKind; 16] = [
        ContentEventKind::Created,
        ContentEventKind::Creating,
        ContentEventKind::Saved,
        ContentEventKind::Saving,
        ContentEventKind::Published,
        ContentEventKind::Publishing,
        ContentEventKind::Deleted,
        ContentEventKind::Deleting,
        ContentEventKind::Moved,
        ContentEventKind::Moving,
        ContentEventKind::CheckedIn,
        ContentEventKind::CheckingIn,
        ContentEventKind::CheckedOut,
        ContentEventKind::CheckingOut,
        ContentEventKind::Rejected,
        ContentEventKind::Rejecting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentEventKind::Created => "created",
            ContentEventKind::Creating => "creating",
            ContentEventKind::Saved => "saved",
            ContentEventKind::Saving => "saving",
            ContentEventKind::Published => "published",
            ContentEventKind::Publishing => "publishing",
            ContentEventKind::Deleted => "deleted",
            ContentEventKind::Deleting => "deleting",
            ContentEventKind::Moved => "moved",
            ContentEventKind::Moving => "moving",
            ContentEventKind::CheckedIn => "checkedin",
            ContentEventKind::CheckingIn => "checkingin",
            ContentEventKind::CheckedOut => "checkedout",
            ContentEventKind::CheckingOut => "checkingout",
            ContentEventKind::Rejected => "rejected",
            ContentEventKind::Rejecting => "rejecting",
        }
    }

    /// Delete notifications never carry a content snapshot.
    pub fn carries_content(&self) -> bool {
        !matches!(self, ContentEventKind::Deleted | ContentEventKind::Deleting)
    }
}

impl fmt::Display for ContentEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentEventKind {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ContentEventKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| EventError::Configuration(format!("unknown content event kind: {s}")))
    }
}

/// What the host knows about the content item at the time of the event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentSnapshot {
    pub guid: Uuid,
    pub name: String,
    pub content_type: String,
    pub language: Option<String>,
    pub url: Option<String>,
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentEvent {
    /// Host reference to the content, e.g. `42_7` for version 7 of item 42.
    pub content_link: Option<String>,
    pub content_id: Option<i64>,
    pub content: Option<ContentSnapshot>,
}

impl ContentEvent {
    pub fn new(content_link: impl Into<String>, content_id: i64) -> Self {
        Self {
            content_link: Some(content_link.into()),
            content_id: Some(content_id),
            content: None,
        }
    }

    pub fn with_content(mut self, content: ContentSnapshot) -> Self {
        self.content = Some(content);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Published".parse::<ContentEventKind>().unwrap(), ContentEventKind::Published);
        assert_eq!(" checkedin ".parse::<ContentEventKind>().unwrap(), ContentEventKind::CheckedIn);
    }

    #[test]
    fn unknown_kind_rejected() {
        assert!(matches!(
            "archived".parse::<ContentEventKind>(),
            Err(EventError::Configuration(_))
        ));
    }

    #[test]
    fn every_kind_round_trips_through_its_name() {
        for kind in ContentEventKind::ALL {
            assert_eq!(kind.as_str().parse::<ContentEventKind>().unwrap(), kind);
        }
    }

    #[test]
    fn delete_kinds_carry_no_content() {
        assert!(!ContentEventKind::Deleted.carries_content());
        assert!(!ContentEventKind::Deleting.carries_content());
        assert!(ContentEventKind::Saved.carries_content());
    }
}
