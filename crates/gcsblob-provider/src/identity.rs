use std::fmt;

use gcsblob_core::{StorageError, StorageResult};
use url::Url;

/// Absolute URI naming one stored object, or a container prefix.
///
/// The object name is the percent-decoded path without its leading `/`, so
/// `blob://default/images/logo.png` maps to `images/logo.png` in the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobIdentity {
    uri: Url,
    object_name: String,
}

impl BlobIdentity {
    pub fn parse(uri: &str) -> StorageResult<Self> {
        let url = Url::parse(uri).map_err(|e| {
            StorageError::InvalidArgument(format!(
                "blob identifier must be an absolute uri: {uri} ({e})"
            ))
        })?;
        Self::from_url(url)
    }

    pub fn from_url(uri: Url) -> StorageResult<Self> {
        if uri.cannot_be_a_base() {
            return Err(StorageError::InvalidArgument(format!(
                "blob identifier has no hierarchical path: {uri}"
            )));
        }
        let path = uri.path().trim_start_matches('/');
        let object_name = urlencoding::decode(path)
            .map_err(|e| StorageError::InvalidArgument(format!("invalid path in {uri}: {e}")))?
            .into_owned();
        Ok(Self { uri, object_name })
    }

    /// Build an identity for a new object inside the container named by
    /// `container`'s first path segment.
    pub fn new_in_container(container: &BlobIdentity, extension: &str) -> StorageResult<Self> {
        let segment = container.segments().into_iter().next().ok_or_else(|| {
            StorageError::InvalidArgument(format!("{} does not name a container", container.uri))
        })?;
        let file_name = format!("{}{}", uuid::Uuid::new_v4().simple(), extension);
        let mut uri = container.uri.clone();
        uri.set_query(None);
        uri.set_fragment(None);
        uri.set_path(&format!("/{segment}/{file_name}"));
        Self::from_url(uri)
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    /// Non-empty path segments, percent-decoded.
    pub fn segments(&self) -> Vec<String> {
        self.object_name
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// True when the identity addresses one object rather than a container.
    pub fn is_single_object(&self) -> bool {
        self.segments().len() > 1
    }

    pub fn file_name(&self) -> &str {
        self.object_name
            .rsplit('/')
            .next()
            .unwrap_or(self.object_name.as_str())
    }
}

impl fmt::Display for BlobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_name_strips_leading_slash() {
        let id = BlobIdentity::parse("blob://default/images/logo.png").unwrap();
        assert_eq!(id.object_name(), "images/logo.png");
        assert_eq!(id.file_name(), "logo.png");
        assert!(id.is_single_object());
    }

    #[test]
    fn relative_uri_rejected() {
        let err = BlobIdentity::parse("images/logo.png").unwrap_err();
        assert!(matches!(err, StorageError::InvalidArgument(_)));
        let err = BlobIdentity::parse("/images/logo.png").unwrap_err();
        assert!(matches!(err, StorageError::InvalidArgument(_)));
    }

    #[test]
    fn container_identity_is_prefix() {
        let id = BlobIdentity::parse("blob://default/images").unwrap();
        assert!(!id.is_single_object());
        assert_eq!(id.segments(), vec!["images"]);

        let id = BlobIdentity::parse("blob://default/images/").unwrap();
        assert!(!id.is_single_object());
    }

    #[test]
    fn path_is_percent_decoded() {
        let id = BlobIdentity::parse("blob://default/docs/annual%20report.pdf").unwrap();
        assert_eq!(id.object_name(), "docs/annual report.pdf");
    }

    #[test]
    fn new_in_container_uses_first_segment() {
        let container = BlobIdentity::parse("blob://default/media/ignored").unwrap();
        let id = BlobIdentity::new_in_container(&container, ".jpg").unwrap();
        let segments = id.segments();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], "media");
        assert!(segments[1].ends_with(".jpg"));
        assert_eq!(segments[1].len(), 32 + 4);
    }

    #[test]
    fn new_in_container_requires_segment() {
        let container = BlobIdentity::parse("blob://default/").unwrap();
        assert!(BlobIdentity::new_in_container(&container, ".jpg").is_err());
    }
}
