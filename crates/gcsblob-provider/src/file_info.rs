use std::io::Cursor;

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// File-system style view of a downloaded blob.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub name: String,
    pub length: u64,
    pub last_modified: DateTime<Utc>,
    pub exists: bool,
    pub is_directory: bool,
    pub physical_path: Option<String>,
    content: Bytes,
}

impl FileInfo {
    /// `last_modified` defaults to the current time.
    pub fn new(name: impl Into<String>, content: Bytes, last_modified: Option<DateTime<Utc>>) -> Self {
        Self {
            name: name.into(),
            length: content.len() as u64,
            last_modified: last_modified.unwrap_or_else(Utc::now),
            exists: true,
            is_directory: false,
            physical_path: None,
            content,
        }
    }

    pub fn create_read_stream(&self) -> Cursor<Bytes> {
        Cursor::new(self.content.clone())
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }
}
