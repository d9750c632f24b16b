use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gcsblob_core::{
    BucketDescriptor, BucketSettings, MimeResolver, ObjectStoreClient, StorageError,
    StorageResult, UrlSigner,
};
use gcsblob_core::config::MAX_SIGNED_URL_MINUTES;

use crate::blob::{Blob, Transport};
use crate::identity::BlobIdentity;
use crate::labels::{creation_labels, host_name};
use crate::signed::SignedTransfer;

/// Entry point translating blob URIs into [`Blob`]s backed by one bucket.
///
/// Construct the object store client first, then the signer, then the
/// provider, which shares their handles with every blob.
pub struct BlobProvider {
    settings: BucketSettings,
    transport: Arc<Transport>,
    mime: Arc<dyn MimeResolver>,
}

impl BlobProvider {
    pub fn new(
        settings: BucketSettings,
        client: Arc<dyn ObjectStoreClient>,
        signer: Option<Arc<dyn UrlSigner>>,
        mime: Arc<dyn MimeResolver>,
    ) -> StorageResult<Self> {
        if settings.bucket_name.trim().is_empty() {
            return Err(StorageError::Configuration(
                "bucket name is required".to_string(),
            ));
        }
        let minutes = settings.signed_url_duration_minutes;
        if minutes == 0 || minutes > MAX_SIGNED_URL_MINUTES {
            return Err(StorageError::Configuration(format!(
                "signed url duration must be 1..={MAX_SIGNED_URL_MINUTES} minutes, got {minutes}"
            )));
        }
        if settings.use_signed_urls && signer.is_none() {
            return Err(StorageError::Configuration(
                "signed urls are enabled but no url signer was provided".to_string(),
            ));
        }

        let signed = signer
            .map(|signer| {
                SignedTransfer::new(
                    signer,
                    settings.bucket_name.clone(),
                    Duration::from_secs(u64::from(settings.signed_url_duration_minutes) * 60),
                    Duration::from_secs(settings.transfer_timeout_secs),
                )
            })
            .transpose()?;

        let transport = Arc::new(Transport {
            bucket: settings.bucket_name.clone(),
            client,
            signed,
            use_signed_urls: settings.use_signed_urls,
        });

        Ok(Self {
            settings,
            transport,
            mime,
        })
    }

    pub fn settings(&self) -> &BucketSettings {
        &self.settings
    }

    pub fn bucket_name(&self) -> &str {
        &self.settings.bucket_name
    }

    /// Make sure the backing bucket exists. Returns `true` if it was created.
    pub async fn create_if_not_exist(&self) -> StorageResult<bool> {
        let bucket = self.bucket_name();
        match self.transport.client.get_bucket(bucket).await {
            Ok(_) => {
                tracing::debug!(bucket, "bucket already exists");
                Ok(false)
            }
            Err(e) if e.is_not_found() => {
                let descriptor = BucketDescriptor {
                    name: bucket.to_string(),
                    location: self.settings.location.clone(),
                    labels: creation_labels(Utc::now(), &host_name()),
                };
                let project_id = self.settings.resolved_project_id();
                self.transport
                    .client
                    .create_bucket(&project_id, &descriptor)
                    .await?;
                tracing::info!(bucket, project_id = %project_id, "created bucket");
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve `uri` to a blob whose content type is guessed from its file name.
    pub fn get_blob(&self, uri: &str) -> StorageResult<Blob> {
        let id = BlobIdentity::parse(uri)?;
        if id.segments().is_empty() {
            return Err(StorageError::InvalidArgument(format!(
                "{uri} does not name an object"
            )));
        }
        Ok(self.blob_for(id))
    }

    pub fn blob_for(&self, id: BlobIdentity) -> Blob {
        let content_type = self.mime.mime_mapping(id.file_name());
        Blob::new(id, self.transport.clone()).with_content_type(content_type)
    }

    /// A blob with a fresh unique name inside the container `container_uri`.
    pub fn create_blob(&self, container_uri: &str, extension: &str) -> StorageResult<Blob> {
        let container = BlobIdentity::parse(container_uri)?;
        Ok(self.blob_for(BlobIdentity::new_in_container(&container, extension)?))
    }

    /// Delete the object `uri` names, or everything under its container.
    pub async fn delete(&self, uri: &str) -> StorageResult<()> {
        let id = BlobIdentity::parse(uri)?;
        if id.is_single_object() {
            return self.blob_for(id).delete_if_exists().await;
        }

        let prefix = id.segments().into_iter().next().ok_or_else(|| {
            StorageError::InvalidArgument(format!("{uri} names neither an object nor a container"))
        })?;
        let deleted = self.delete_by_prefix(&prefix).await?;
        tracing::debug!(bucket = self.bucket_name(), prefix = %prefix, deleted, "deleted container");
        Ok(())
    }

    /// Delete every object under `prefix/`, one at a time.
    ///
    /// Objects that vanish mid-listing are skipped. Any other failure stops
    /// the loop and is returned; earlier deletes are not undone.
    pub async fn delete_by_prefix(&self, prefix: &str) -> StorageResult<usize> {
        if prefix.is_empty() {
            return Err(StorageError::InvalidArgument(
                "prefix must not be empty".to_string(),
            ));
        }
        let mut prefix = prefix.to_string();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }

        let bucket = self.bucket_name();
        let objects = self
            .transport
            .client
            .list_objects(bucket, Some(&prefix))
            .await?;

        let mut deleted = 0;
        for object in objects {
            match self.transport.client.delete(bucket, &object.name).await {
                Ok(()) => deleted += 1,
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(deleted)
    }
}
