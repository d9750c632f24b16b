use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;

use gcsblob_core::{
    ObjectMetadata, ObjectStoreClient, SignedMethod, StorageResult, UrlSigner,
};

use crate::memory::MemoryObjectStore;

/// Query parameter carrying the content type a PUT URL was signed for.
const SIGNED_CONTENT_TYPE_PARAM: &str = "x-signed-content-type";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub bucket: String,
    pub object: String,
    pub content_type: Option<String>,
}

struct ServerState {
    store: Arc<MemoryObjectStore>,
    requests: Mutex<Vec<RecordedRequest>>,
    /// Non-zero forces every response to this status.
    forced_status: AtomicU16,
}

/// Loopback HTTP endpoint standing in for signed-URL object access.
///
/// GET and PUT on `/{bucket}/{object}` read and write the wrapped
/// [`MemoryObjectStore`]. A PUT whose `content-type` differs from the one
/// the URL was signed for is rejected with 403.
pub struct SignedUrlServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl SignedUrlServer {
    pub async fn start(store: Arc<MemoryObjectStore>) -> Self {
        let state = Arc::new(ServerState {
            store,
            requests: Mutex::new(Vec::new()),
            forced_status: AtomicU16::new(0),
        });

        let router = Router::new()
            .route("/{bucket}/{*object}", get(get_object).put(put_object))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind loopback listener");
        let addr = listener.local_addr().expect("listener has no address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn signer(&self) -> Arc<LoopbackSigner> {
        Arc::new(LoopbackSigner::new(self.base_url()))
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Answer every subsequent request with `status`.
    pub fn force_status(&self, status: StatusCode) {
        self.state
            .forced_status
            .store(status.as_u16(), Ordering::SeqCst);
    }
}

fn record(state: &ServerState, method: &str, bucket: &str, object: &str, headers: &HeaderMap) {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.to_string(),
        bucket: bucket.to_string(),
        object: object.to_string(),
        content_type,
    });
}

fn forced(state: &ServerState) -> Option<Response> {
    match state.forced_status.load(Ordering::SeqCst) {
        0 => None,
        code => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            Some((status, "forced failure").into_response())
        }
    }
}

async fn get_object(
    State(state): State<Arc<ServerState>>,
    Path((bucket, object)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    record(&state, "GET", &bucket, &object, &headers);
    if let Some(resp) = forced(&state) {
        return resp;
    }
    match state.store.download(&bucket, &object).await {
        Ok(data) => (StatusCode::OK, data).into_response(),
        Err(e) if e.is_not_found() => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn put_object(
    State(state): State<Arc<ServerState>>,
    Path((bucket, object)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    record(&state, "PUT", &bucket, &object, &headers);
    if let Some(resp) = forced(&state) {
        return resp;
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if let Some(signed) = query.get(SIGNED_CONTENT_TYPE_PARAM) {
        if content_type.as_deref() != Some(signed.as_str()) {
            return (StatusCode::FORBIDDEN, "content-type does not match signature").into_response();
        }
    }

    let metadata = ObjectMetadata::new(object, content_type);
    match state.store.upload(&bucket, &metadata, body).await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) if e.is_not_found() => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRequest {
    pub bucket: String,
    pub object: String,
    pub duration: Duration,
    pub method: SignedMethod,
    pub headers: Vec<(String, String)>,
}

/// Signs URLs that point at a [`SignedUrlServer`] and records each request.
pub struct LoopbackSigner {
    base_url: String,
    requests: Mutex<Vec<SignRequest>>,
}

impl LoopbackSigner {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<SignRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl UrlSigner for LoopbackSigner {
    fn sign(
        &self,
        bucket: &str,
        object: &str,
        duration: Duration,
        method: SignedMethod,
        headers: &[(String, String)],
    ) -> StorageResult<String> {
        self.requests.lock().unwrap().push(SignRequest {
            bucket: bucket.to_string(),
            object: object.to_string(),
            duration,
            method,
            headers: headers.to_vec(),
        });

        let path = object
            .split('/')
            .map(|s| urlencoding::encode(s).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let mut url = format!(
            "{}/{}/{}?method={}&expires={}",
            self.base_url,
            bucket,
            path,
            method,
            duration.as_secs()
        );
        for (name, value) in headers {
            if name.eq_ignore_ascii_case("content-type") {
                url.push_str(&format!(
                    "&{SIGNED_CONTENT_TYPE_PARAM}={}",
                    urlencoding::encode(value)
                ));
            }
        }
        Ok(url)
    }
}
