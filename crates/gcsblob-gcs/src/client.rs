use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use gcsblob_core::{
    BucketDescriptor, BucketSettings, ObjectDescriptor, ObjectMetadata, ObjectStoreClient,
    StorageError, StorageResult,
};

use crate::credentials::{TokenSource, token_source_from_settings};

pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Object store client speaking the Cloud Storage JSON API.
#[derive(Clone)]
pub struct GcsClient {
    endpoint: String,
    http: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectResource {
    bucket: String,
    name: String,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    updated: Option<DateTime<Utc>>,
}

impl From<ObjectResource> for ObjectDescriptor {
    fn from(o: ObjectResource) -> Self {
        ObjectDescriptor {
            bucket: o.bucket,
            name: o.name,
            size: o.size.and_then(|s| s.parse().ok()).unwrap_or(0),
            content_type: o.content_type,
            updated: o.updated,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct BucketResource {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    labels: BTreeMap<String, String>,
}

impl From<BucketResource> for BucketDescriptor {
    fn from(b: BucketResource) -> Self {
        BucketDescriptor {
            name: b.name,
            location: b.location,
            labels: b.labels,
        }
    }
}

impl GcsClient {
    pub fn new(endpoint: Option<&str>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            endpoint: endpoint
                .unwrap_or(DEFAULT_ENDPOINT)
                .trim_end_matches('/')
                .to_string(),
            http: reqwest::Client::new(),
            tokens,
        }
    }

    pub fn from_settings(settings: &BucketSettings) -> StorageResult<Self> {
        let tokens = token_source_from_settings(settings)?;
        Ok(Self::new(settings.endpoint.as_deref(), tokens))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn object_url(&self, bucket: &str, name: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.endpoint,
            urlencoding::encode(bucket),
            urlencoding::encode(name)
        )
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> StorageResult<Response> {
        let request = match self.tokens.token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let resp = request
            .send()
            .await
            .map_err(|e| StorageError::Storage(format!("{what} failed: {e}")))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::Storage(format!(
                "{what} returned {status}: {body}"
            )));
        }
        Ok(resp)
    }
}

fn decode_error(what: &str, e: reqwest::Error) -> StorageError {
    StorageError::Storage(format!("invalid response to {what}: {e}"))
}

#[async_trait]
impl ObjectStoreClient for GcsClient {
    async fn download(&self, bucket: &str, name: &str) -> StorageResult<Bytes> {
        let what = format!("download of {name} from {bucket}");
        let request = self
            .http
            .get(self.object_url(bucket, name))
            .query(&[("alt", "media")]);
        let resp = self.send(request, &what).await?;
        resp.bytes().await.map_err(|e| decode_error(&what, e))
    }

    async fn upload(
        &self,
        bucket: &str,
        metadata: &ObjectMetadata,
        data: Bytes,
    ) -> StorageResult<ObjectDescriptor> {
        let what = format!("upload of {} to {bucket}", metadata.name);
        let url = format!(
            "{}/upload/storage/v1/b/{}/o",
            self.endpoint,
            urlencoding::encode(bucket)
        );
        let request = self
            .http
            .post(url)
            .query(&[("uploadType", "media"), ("name", metadata.name.as_str())])
            .header(CONTENT_TYPE, metadata.content_type_or_default())
            .body(data);
        let resp = self.send(request, &what).await?;
        let object: ObjectResource = resp.json().await.map_err(|e| decode_error(&what, e))?;
        Ok(object.into())
    }

    async fn delete(&self, bucket: &str, name: &str) -> StorageResult<()> {
        let what = format!("delete of {name} from {bucket}");
        let request = self.http.delete(self.object_url(bucket, name));
        self.send(request, &what).await?;
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> StorageResult<Vec<ObjectDescriptor>> {
        let what = format!("listing of {bucket}");
        let url = format!(
            "{}/storage/v1/b/{}/o",
            self.endpoint,
            urlencoding::encode(bucket)
        );

        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.http.get(&url);
            if let Some(prefix) = prefix {
                request = request.query(&[("prefix", prefix)]);
            }
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let resp = self.send(request, &what).await?;
            let page: ObjectList = resp.json().await.map_err(|e| decode_error(&what, e))?;
            objects.extend(page.items.into_iter().map(ObjectDescriptor::from));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(objects)
    }

    async fn get_bucket(&self, name: &str) -> StorageResult<BucketDescriptor> {
        let what = format!("bucket {name}");
        let url = format!("{}/storage/v1/b/{}", self.endpoint, urlencoding::encode(name));
        let resp = self.send(self.http.get(url), &what).await?;
        let bucket: BucketResource = resp.json().await.map_err(|e| decode_error(&what, e))?;
        Ok(bucket.into())
    }

    async fn create_bucket(
        &self,
        project_id: &str,
        bucket: &BucketDescriptor,
    ) -> StorageResult<BucketDescriptor> {
        let what = format!("creation of bucket {}", bucket.name);
        let body = BucketResource {
            name: bucket.name.clone(),
            location: bucket.location.clone(),
            labels: bucket.labels.clone(),
        };
        let request = self
            .http
            .post(format!("{}/storage/v1/b", self.endpoint))
            .query(&[("project", project_id)])
            .json(&body);
        let resp = self.send(request, &what).await?;
        let created: BucketResource = resp.json().await.map_err(|e| decode_error(&what, e))?;
        Ok(created.into())
    }
}
