use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use gcsblob_core::{
    BucketDescriptor, ObjectDescriptor, ObjectMetadata, ObjectStoreClient, StorageError,
    StorageResult,
};

const META_SUFFIX: &str = ".meta";
const BUCKET_FILE: &str = ".bucket.json";

/// Object store backed by a local directory, for development without GCS.
///
/// Layout: `{root}/{bucket}/{object name}` holds the bytes and
/// `{root}/{bucket}/{object name}.meta` holds the content type. Slashes in
/// object names become subdirectories.
#[derive(Clone, Debug)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .map_err(|e| StorageError::Storage(format!("failed to create store directory: {e}")))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> StorageResult<PathBuf> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket.starts_with('.') {
            return Err(StorageError::InvalidArgument(format!(
                "invalid bucket name: {bucket:?}"
            )));
        }
        Ok(self.root.join(bucket))
    }

    /// Existing bucket directory, or `NotFound`.
    async fn existing_bucket(&self, bucket: &str) -> StorageResult<PathBuf> {
        let dir = self.bucket_dir(bucket)?;
        match tokio::fs::metadata(&dir).await {
            Ok(m) if m.is_dir() => Ok(dir),
            Ok(_) => Err(StorageError::NotFound(format!("bucket {bucket}"))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("bucket {bucket}")))
            }
            Err(e) => Err(StorageError::Storage(format!("failed to stat bucket: {e}"))),
        }
    }

    fn object_path(bucket_dir: &Path, name: &str) -> StorageResult<PathBuf> {
        let valid = !name.is_empty()
            && !name.ends_with(META_SUFFIX)
            && name
                .split('/')
                .all(|s| !s.is_empty() && s != "." && s != ".." && s != BUCKET_FILE);
        if !valid {
            return Err(StorageError::InvalidArgument(format!(
                "invalid object name: {name:?}"
            )));
        }
        Ok(bucket_dir.join(name))
    }

    fn meta_path(object_path: &Path) -> PathBuf {
        let mut os = object_path.as_os_str().to_owned();
        os.push(META_SUFFIX);
        PathBuf::from(os)
    }

    async fn describe(
        bucket: &str,
        name: String,
        object_path: &Path,
    ) -> StorageResult<ObjectDescriptor> {
        let meta = tokio::fs::metadata(object_path)
            .await
            .map_err(|e| StorageError::Storage(format!("failed to stat {name}: {e}")))?;
        let content_type = match tokio::fs::read_to_string(Self::meta_path(object_path)).await {
            Ok(ct) => Some(ct),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                return Err(StorageError::Storage(format!(
                    "failed to read metadata of {name}: {e}"
                )));
            }
        };
        Ok(ObjectDescriptor {
            bucket: bucket.to_string(),
            name,
            size: meta.len(),
            content_type,
            updated: meta.modified().ok().map(DateTime::<Utc>::from),
        })
    }
}

#[async_trait]
impl ObjectStoreClient for FsObjectStore {
    async fn download(&self, bucket: &str, name: &str) -> StorageResult<Bytes> {
        let dir = self.existing_bucket(bucket).await?;
        let path = Self::object_path(&dir, name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("{bucket}/{name}")))
            }
            Err(e) => Err(StorageError::Storage(format!("failed to read {name}: {e}"))),
        }
    }

    async fn upload(
        &self,
        bucket: &str,
        metadata: &ObjectMetadata,
        data: Bytes,
    ) -> StorageResult<ObjectDescriptor> {
        let dir = self.existing_bucket(bucket).await?;
        let path = Self::object_path(&dir, &metadata.name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Storage(format!("failed to create directory: {e}")))?;
        }

        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| StorageError::Storage(format!("failed to write {}: {e}", metadata.name)))?;
        tokio::fs::write(Self::meta_path(&path), metadata.content_type_or_default())
            .await
            .map_err(|e| {
                StorageError::Storage(format!("failed to write metadata of {}: {e}", metadata.name))
            })?;

        tracing::debug!(bucket, name = %metadata.name, size = data.len(), "stored object");
        Self::describe(bucket, metadata.name.clone(), &path).await
    }

    async fn delete(&self, bucket: &str, name: &str) -> StorageResult<()> {
        let dir = self.existing_bucket(bucket).await?;
        let path = Self::object_path(&dir, name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(format!("{bucket}/{name}")));
            }
            Err(e) => {
                return Err(StorageError::Storage(format!("failed to delete {name}: {e}")));
            }
        }

        match tokio::fs::remove_file(Self::meta_path(&path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Storage(format!(
                "failed to delete metadata of {name}: {e}"
            ))),
        }
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> StorageResult<Vec<ObjectDescriptor>> {
        let dir = self.existing_bucket(bucket).await?;

        let mut names = Vec::new();
        let mut pending = vec![(dir.clone(), String::new())];
        while let Some((current, relative)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&current)
                .await
                .map_err(|e| StorageError::Storage(format!("failed to list {bucket}: {e}")))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::Storage(format!("failed to read directory entry: {e}")))?
            {
                let file_name = entry.file_name().to_string_lossy().into_owned();
                let name = if relative.is_empty() {
                    file_name.clone()
                } else {
                    format!("{relative}/{file_name}")
                };
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StorageError::Storage(format!("failed to stat {name}: {e}")))?;
                if file_type.is_dir() {
                    pending.push((entry.path(), name));
                } else if !file_name.ends_with(META_SUFFIX) && file_name != BUCKET_FILE {
                    names.push(name);
                }
            }
        }

        names.retain(|n| prefix.is_none_or(|p| n.starts_with(p)));
        names.sort();

        let mut objects = Vec::with_capacity(names.len());
        for name in names {
            let path = dir.join(&name);
            objects.push(Self::describe(bucket, name, &path).await?);
        }
        Ok(objects)
    }

    async fn get_bucket(&self, name: &str) -> StorageResult<BucketDescriptor> {
        let dir = self.existing_bucket(name).await?;
        match tokio::fs::read(dir.join(BUCKET_FILE)).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .map_err(|e| StorageError::Storage(format!("corrupt bucket file for {name}: {e}"))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BucketDescriptor::named(name)),
            Err(e) => Err(StorageError::Storage(format!(
                "failed to read bucket file for {name}: {e}"
            ))),
        }
    }

    async fn create_bucket(
        &self,
        _project_id: &str,
        bucket: &BucketDescriptor,
    ) -> StorageResult<BucketDescriptor> {
        let dir = self.bucket_dir(&bucket.name)?;
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::Storage(format!(
                    "bucket {} already exists",
                    bucket.name
                )));
            }
            Err(e) => {
                return Err(StorageError::Storage(format!("failed to create bucket: {e}")));
            }
        }

        let raw = serde_json::to_vec_pretty(bucket)
            .map_err(|e| StorageError::Internal(format!("failed to encode bucket: {e}")))?;
        tokio::fs::write(dir.join(BUCKET_FILE), raw)
            .await
            .map_err(|e| StorageError::Storage(format!("failed to write bucket file: {e}")))?;
        Ok(bucket.clone())
    }
}
