use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use gcsblob_core::{
    DEFAULT_CONTENT_TYPE, ObjectMetadata, ObjectStoreClient, SignedMethod, StorageError,
    StorageResult,
};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::file_info::FileInfo;
use crate::identity::BlobIdentity;
use crate::signed::SignedTransfer;
use crate::writer::BlobWriter;

/// Handles shared by every blob a provider hands out.
pub(crate) struct Transport {
    pub(crate) bucket: String,
    pub(crate) client: Arc<dyn ObjectStoreClient>,
    pub(crate) signed: Option<SignedTransfer>,
    pub(crate) use_signed_urls: bool,
}

impl Transport {
    /// The signed path, when transfers are configured to go through it.
    fn signed_mode(&self) -> Option<&SignedTransfer> {
        if self.use_signed_urls {
            self.signed.as_ref()
        } else {
            None
        }
    }
}

/// One object in the bucket.
///
/// Cheap to clone; the client and signer are shared with the provider.
#[derive(Clone)]
pub struct Blob {
    id: BlobIdentity,
    content_type: Option<String>,
    transport: Arc<Transport>,
}

impl Blob {
    pub(crate) fn new(id: BlobIdentity, transport: Arc<Transport>) -> Self {
        Self {
            id,
            content_type: None,
            transport,
        }
    }

    pub fn id(&self) -> &BlobIdentity {
        &self.id
    }

    pub fn object_name(&self) -> &str {
        self.id.object_name()
    }

    pub fn bucket(&self) -> &str {
        &self.transport.bucket
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = Some(content_type.into());
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.set_content_type(content_type);
        self
    }

    /// Download the whole object and return a cursor positioned at offset 0.
    pub async fn open_read(&self) -> StorageResult<Cursor<Bytes>> {
        Ok(Cursor::new(self.read_bytes().await?))
    }

    pub async fn read_bytes(&self) -> StorageResult<Bytes> {
        let name = self.object_name();
        match self.transport.signed_mode() {
            Some(signed) => signed.download(name).await,
            None => {
                tracing::debug!(bucket = %self.transport.bucket, object = name, "downloading object");
                self.transport
                    .client
                    .download(&self.transport.bucket, name)
                    .await
            }
        }
    }

    /// A buffered writer that uploads once, when closed.
    pub fn open_write(&self) -> BlobWriter {
        BlobWriter::new(self.clone())
    }

    /// Upload `data` immediately under the current content type.
    pub async fn write(&self, data: Bytes) -> StorageResult<()> {
        let name = self.object_name();
        let content_type = self.content_type().unwrap_or(DEFAULT_CONTENT_TYPE);
        match self.transport.signed_mode() {
            Some(signed) => signed.upload(name, content_type, data).await,
            None => {
                tracing::debug!(
                    bucket = %self.transport.bucket,
                    object = name,
                    content_type,
                    bytes = data.len(),
                    "uploading object"
                );
                let metadata = ObjectMetadata::new(name, Some(content_type.to_string()));
                self.transport
                    .client
                    .upload(&self.transport.bucket, &metadata, data)
                    .await?;
                Ok(())
            }
        }
    }

    /// Read `reader` to the end, then upload it as [`Blob::write`] does.
    pub async fn write_from<R>(&self, mut reader: R) -> StorageResult<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| StorageError::Storage(format!("failed to read source stream: {e}")))?;
        self.write(Bytes::from(buf)).await
    }

    /// Delete the object. A missing object counts as success.
    pub async fn delete_if_exists(&self) -> StorageResult<()> {
        match self
            .transport
            .client
            .delete(&self.transport.bucket, self.object_name())
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Download the object and wrap it with file metadata.
    pub async fn as_file_info(&self, last_modified: Option<DateTime<Utc>>) -> StorageResult<FileInfo> {
        let content = self.read_bytes().await?;
        Ok(FileInfo::new(self.object_name(), content, last_modified))
    }

    /// A URL granting `method` on this object without store credentials.
    ///
    /// PUT URLs are bound to the blob's content type.
    pub fn signed_url(&self, method: SignedMethod) -> StorageResult<String> {
        let signed = self.transport.signed.as_ref().ok_or_else(|| {
            StorageError::Configuration("no url signer configured".to_string())
        })?;
        let content_type = self.content_type().unwrap_or(DEFAULT_CONTENT_TYPE);
        signed.signed_url(self.object_name(), method, Some(content_type))
    }
}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob")
            .field("id", &self.id)
            .field("bucket", &self.transport.bucket)
            .field("content_type", &self.content_type)
            .field("use_signed_urls", &self.transport.use_signed_urls)
            .finish()
    }
}
