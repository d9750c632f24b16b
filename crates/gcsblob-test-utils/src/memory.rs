use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use gcsblob_core::{
    BucketDescriptor, ObjectDescriptor, ObjectMetadata, ObjectStoreClient, StorageError,
    StorageResult,
};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub updated: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    buckets: HashMap<String, BucketDescriptor>,
    objects: HashMap<String, BTreeMap<String, StoredObject>>,
    uploads: HashMap<String, usize>,
    created_buckets: Vec<(String, BucketDescriptor)>,
    failing_deletes: HashSet<String>,
    delete_calls: Vec<String>,
}

/// In-process object store that records what callers did to it.
#[derive(Default)]
pub struct MemoryObjectStore {
    inner: Mutex<Inner>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds an empty bucket called `bucket`.
    pub fn with_bucket(bucket: &str) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock().unwrap();
            inner
                .buckets
                .insert(bucket.to_string(), BucketDescriptor::named(bucket));
            inner.objects.insert(bucket.to_string(), BTreeMap::new());
        }
        store
    }

    /// Seed an object without counting it as an upload.
    pub fn insert(&self, bucket: &str, name: &str, data: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.objects.entry(bucket.to_string()).or_default().insert(
            name.to_string(),
            StoredObject {
                data: Bytes::copy_from_slice(data),
                content_type: None,
                updated: Utc::now(),
            },
        );
    }

    pub fn object(&self, bucket: &str, name: &str) -> Option<StoredObject> {
        let inner = self.inner.lock().unwrap();
        inner.objects.get(bucket)?.get(name).cloned()
    }

    pub fn object_names(&self, bucket: &str) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .objects
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// How many uploads targeted `name`, in any bucket.
    pub fn upload_count(&self, name: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.uploads.get(name).copied().unwrap_or(0)
    }

    pub fn created_buckets(&self) -> Vec<(String, BucketDescriptor)> {
        self.inner.lock().unwrap().created_buckets.clone()
    }

    pub fn delete_calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().delete_calls.clone()
    }

    /// Make every delete of `name` fail with a storage error.
    pub fn fail_deletes_of(&self, name: &str) {
        self.inner
            .lock()
            .unwrap()
            .failing_deletes
            .insert(name.to_string());
    }
}

fn missing_bucket(bucket: &str) -> StorageError {
    StorageError::NotFound(format!("bucket {bucket}"))
}

#[async_trait]
impl ObjectStoreClient for MemoryObjectStore {
    async fn download(&self, bucket: &str, name: &str) -> StorageResult<Bytes> {
        let inner = self.inner.lock().unwrap();
        inner
            .objects
            .get(bucket)
            .and_then(|objects| objects.get(name))
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::NotFound(format!("object {name} in bucket {bucket}")))
    }

    async fn upload(
        &self,
        bucket: &str,
        metadata: &ObjectMetadata,
        data: Bytes,
    ) -> StorageResult<ObjectDescriptor> {
        let mut inner = self.inner.lock().unwrap();
        *inner.uploads.entry(metadata.name.clone()).or_default() += 1;
        let updated = Utc::now();
        let size = data.len() as u64;
        let objects = inner
            .objects
            .get_mut(bucket)
            .ok_or_else(|| missing_bucket(bucket))?;
        objects.insert(
            metadata.name.clone(),
            StoredObject {
                data,
                content_type: metadata.content_type.clone(),
                updated,
            },
        );
        Ok(ObjectDescriptor {
            bucket: bucket.to_string(),
            name: metadata.name.clone(),
            size,
            content_type: metadata.content_type.clone(),
            updated: Some(updated),
        })
    }

    async fn delete(&self, bucket: &str, name: &str) -> StorageResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.delete_calls.push(name.to_string());
        if inner.failing_deletes.contains(name) {
            return Err(StorageError::Storage(format!("injected delete failure for {name}")));
        }
        let objects = inner
            .objects
            .get_mut(bucket)
            .ok_or_else(|| missing_bucket(bucket))?;
        objects
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(format!("object {name} in bucket {bucket}")))
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> StorageResult<Vec<ObjectDescriptor>> {
        let inner = self.inner.lock().unwrap();
        let objects = inner.objects.get(bucket).ok_or_else(|| missing_bucket(bucket))?;
        Ok(objects
            .iter()
            .filter(|(name, _)| prefix.is_none_or(|p| name.starts_with(p)))
            .map(|(name, o)| ObjectDescriptor {
                bucket: bucket.to_string(),
                name: name.clone(),
                size: o.data.len() as u64,
                content_type: o.content_type.clone(),
                updated: Some(o.updated),
            })
            .collect())
    }

    async fn get_bucket(&self, name: &str) -> StorageResult<BucketDescriptor> {
        let inner = self.inner.lock().unwrap();
        inner.buckets.get(name).cloned().ok_or_else(|| missing_bucket(name))
    }

    async fn create_bucket(
        &self,
        project_id: &str,
        bucket: &BucketDescriptor,
    ) -> StorageResult<BucketDescriptor> {
        let mut inner = self.inner.lock().unwrap();
        if inner.buckets.contains_key(&bucket.name) {
            return Err(StorageError::Storage(format!(
                "bucket {} already exists",
                bucket.name
            )));
        }
        inner
            .created_buckets
            .push((project_id.to_string(), bucket.clone()));
        inner.buckets.insert(bucket.name.clone(), bucket.clone());
        inner.objects.entry(bucket.name.clone()).or_default();
        Ok(bucket.clone())
    }
}
