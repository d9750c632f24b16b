use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageResult;
use crate::types::{BucketDescriptor, ObjectDescriptor, ObjectMetadata};

/// Remote object store operations used by the blob provider.
///
/// Implementations are shared across every blob handed out by a provider and
/// must tolerate concurrent callers. Missing objects and buckets are reported
/// as [`StorageError::NotFound`](crate::StorageError::NotFound).
#[async_trait]
pub trait ObjectStoreClient: Send + Sync + 'static {
    async fn download(&self, bucket: &str, name: &str) -> StorageResult<Bytes>;
    async fn upload(
        &self,
        bucket: &str,
        metadata: &ObjectMetadata,
        data: Bytes,
    ) -> StorageResult<ObjectDescriptor>;
    async fn delete(&self, bucket: &str, name: &str) -> StorageResult<()>;
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> StorageResult<Vec<ObjectDescriptor>>;
    async fn get_bucket(&self, name: &str) -> StorageResult<BucketDescriptor>;
    async fn create_bucket(
        &self,
        project_id: &str,
        bucket: &BucketDescriptor,
    ) -> StorageResult<BucketDescriptor>;
}
