use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// Bucket label keys and values are capped at 63 characters.
pub const MAX_LABEL_LEN: usize = 63;

pub const CREATED_DATE_LABEL: &str = "EPiServerGCPCreatedDate";
pub const CREATED_BY_MACHINE_LABEL: &str = "EPiServerGCPCreatedByMachine";

/// Lowercase `label`, replace anything outside `[a-z0-9_-]` with `_`, and
/// truncate to [`MAX_LABEL_LEN`].
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' | '-' => c,
            _ => '_',
        })
        .take(MAX_LABEL_LEN)
        .collect()
}

/// Labels recorded on a bucket when the provider creates it.
pub fn creation_labels(created: DateTime<Utc>, host: &str) -> BTreeMap<String, String> {
    let created = created.format("%Y-%m-%d %H:%M:%S").to_string();
    BTreeMap::from([
        (sanitize_label(CREATED_DATE_LABEL), sanitize_label(&created)),
        (sanitize_label(CREATED_BY_MACHINE_LABEL), sanitize_label(host)),
    ])
}

/// Best-effort name of the machine running the provider.
pub fn host_name() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string())
}
