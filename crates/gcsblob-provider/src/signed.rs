use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use gcsblob_core::{SignedMethod, StorageError, StorageResult, UrlSigner};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;

/// Moves object bytes through pre-signed URLs instead of store credentials.
#[derive(Clone)]
pub struct SignedTransfer {
    signer: Arc<dyn UrlSigner>,
    http: reqwest::Client,
    bucket: String,
    validity: Duration,
}

impl SignedTransfer {
    /// `timeout` applies to the whole request and should leave room for
    /// large payloads.
    pub fn new(
        signer: Arc<dyn UrlSigner>,
        bucket: impl Into<String>,
        validity: Duration,
        timeout: Duration,
    ) -> StorageResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Configuration(format!("failed to build http client: {e}")))?;
        Ok(Self {
            signer,
            http,
            bucket: bucket.into(),
            validity,
        })
    }

    /// Sign `method` on `object`. A PUT URL is bound to `content_type`.
    pub fn signed_url(
        &self,
        object: &str,
        method: SignedMethod,
        content_type: Option<&str>,
    ) -> StorageResult<String> {
        let headers = match (method, content_type) {
            (SignedMethod::Put, Some(ct)) => vec![("content-type".to_string(), ct.to_string())],
            _ => Vec::new(),
        };
        self.signer
            .sign(&self.bucket, object, self.validity, method, &headers)
    }

    pub async fn download(&self, object: &str) -> StorageResult<Bytes> {
        let url = self.signed_url(object, SignedMethod::Get, None)?;
        tracing::debug!(object, "downloading via signed url");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| transfer_error(object, SignedMethod::Get, e))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(format!(
                "object {object} in bucket {}",
                self.bucket
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(transfer_error(
                object,
                SignedMethod::Get,
                format!("status {status}: {body}"),
            ));
        }

        resp.bytes()
            .await
            .map_err(|e| transfer_error(object, SignedMethod::Get, e))
    }

    pub async fn upload(&self, object: &str, content_type: &str, data: Bytes) -> StorageResult<()> {
        let url = self.signed_url(object, SignedMethod::Put, Some(content_type))?;
        tracing::debug!(object, content_type, bytes = data.len(), "uploading via signed url");

        let resp = self
            .http
            .put(&url)
            .header(CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| transfer_error(object, SignedMethod::Put, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(transfer_error(
                object,
                SignedMethod::Put,
                format!("status {status}: {body}"),
            ));
        }
        Ok(())
    }
}

fn transfer_error(object: &str, method: SignedMethod, reason: impl ToString) -> StorageError {
    StorageError::Transfer {
        object: object.to_string(),
        method: method.to_string(),
        reason: reason.to_string(),
    }
}
