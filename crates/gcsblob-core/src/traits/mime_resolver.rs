use crate::types::DEFAULT_CONTENT_TYPE;

pub trait MimeResolver: Send + Sync + 'static {
    fn mime_mapping(&self, file_name: &str) -> String;
}

/// Resolves content types from file extensions.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuessMimeResolver;

impl MimeResolver for GuessMimeResolver {
    fn mime_mapping(&self, file_name: &str) -> String {
        mime_guess::from_path(file_name)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        let resolver = GuessMimeResolver;
        assert_eq!(resolver.mime_mapping("photo.png"), "image/png");
        assert_eq!(resolver.mime_mapping("doc.pdf"), "application/pdf");
    }

    #[test]
    fn unknown_extension_falls_back() {
        let resolver = GuessMimeResolver;
        assert_eq!(resolver.mime_mapping("blob"), DEFAULT_CONTENT_TYPE);
        assert_eq!(resolver.mime_mapping(""), DEFAULT_CONTENT_TYPE);
    }
}
