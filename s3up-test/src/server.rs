//! Stub S3 server management

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use s3up_core::UploaderConfig;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::chunked::{decode_aws_chunked, is_aws_chunked};
use crate::{TEST_ACCESS_KEY_ID, TEST_SECRET_ACCESS_KEY};

/// The S3 operation a request maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    PutObject,
    DeleteObject,
    CreateMultipartUpload,
    UploadPart,
    CompleteMultipartUpload,
    AbortMultipartUpload,
    Unsupported,
}

impl Operation {
    fn classify(method: &Method, query: &HashMap<String, String>) -> Self {
        let upload_id = query.contains_key("uploadId");
        match *method {
            Method::PUT if upload_id && query.contains_key("partNumber") => Self::UploadPart,
            Method::PUT => Self::PutObject,
            Method::POST if query.contains_key("uploads") => Self::CreateMultipartUpload,
            Method::POST if upload_id => Self::CompleteMultipartUpload,
            Method::DELETE if upload_id => Self::AbortMultipartUpload,
            Method::DELETE => Self::DeleteObject,
            _ => Self::Unsupported,
        }
    }
}

/// A request received by the stub
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub operation: Operation,
    pub bucket: String,
    pub key: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    /// Raw body as received, framing included
    pub body: Bytes,
}

impl RecordedRequest {
    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body with any `aws-chunked` framing removed
    pub fn payload(&self) -> Bytes {
        if is_aws_chunked(&self.headers) {
            decode_aws_chunked(&self.body).unwrap_or_else(|| self.body.clone())
        } else {
            self.body.clone()
        }
    }
}

/// Error the stub answers with while set
#[derive(Debug, Clone)]
pub struct StubFailure {
    /// Only fail this operation; `None` fails every request
    pub operation: Option<Operation>,
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl StubFailure {
    fn applies_to(&self, operation: Operation) -> bool {
        self.operation.map_or(true, |op| op == operation)
    }
}

#[derive(Default)]
struct StubState {
    requests: Mutex<Vec<RecordedRequest>>,
    failure: Mutex<Option<StubFailure>>,
    objects: Mutex<HashMap<(String, String), Bytes>>,
    uploads: Mutex<HashMap<String, BTreeMap<i32, Bytes>>>,
    next_upload_id: AtomicU64,
    base_url: String,
}

/// A running stub S3 endpoint.
///
/// Serves `PutObject`, `DeleteObject` and the multipart upload calls on
/// `/{bucket}/{key}`, keeps uploaded objects in memory and records every
/// request. The server task stops when this value is dropped.
pub struct StubS3Server {
    addr: SocketAddr,
    state: Arc<StubState>,
    handle: JoinHandle<()>,
}

impl StubS3Server {
    /// Start a stub on a random local port
    pub async fn start() -> Result<Self, TestError> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| TestError::StartFailed(e.to_string()))?;
        let addr = listener
            .local_addr()
            .map_err(|e| TestError::StartFailed(e.to_string()))?;

        let state = Arc::new(StubState {
            base_url: format!("http://{}", addr),
            ..StubState::default()
        });
        let router = Router::new()
            .route("/:bucket/*key", any(handle_object))
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                warn!(error = %e, "stub S3 server stopped");
            }
        });

        info!(port = addr.port(), "Stub S3 server ready");
        Ok(Self {
            addr,
            state,
            handle,
        })
    }

    /// Get the base URL
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Uploader configuration targeting `bucket` on this stub
    pub fn uploader_config(&self, bucket: &str) -> UploaderConfig {
        UploaderConfig::new(TEST_ACCESS_KEY_ID, TEST_SECRET_ACCESS_KEY, bucket)
            .with_endpoint(self.url())
            .with_force_path_style(true)
    }

    /// Answer every following request with an S3 error.
    ///
    /// An invalid `status` becomes 500.
    pub fn fail_with(&self, status: u16, code: &str, message: &str) {
        self.set_failure(None, status, code, message);
    }

    /// Answer every following `operation` request with an S3 error
    pub fn fail_operation_with(&self, operation: Operation, status: u16, code: &str, message: &str) {
        self.set_failure(Some(operation), status, code, message);
    }

    fn set_failure(&self, operation: Option<Operation>, status: u16, code: &str, message: &str) {
        *self.state.failure.lock() = Some(StubFailure {
            operation,
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            code: code.to_string(),
            message: message.to_string(),
        });
    }

    /// Go back to answering requests successfully
    pub fn clear_failure(&self) {
        *self.state.failure.lock() = None;
    }

    /// All requests received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.state.requests.lock().last().cloned()
    }

    /// Operations received so far, oldest first
    pub fn operations(&self) -> Vec<Operation> {
        self.state
            .requests
            .lock()
            .iter()
            .map(|r| r.operation)
            .collect()
    }

    /// Contents of a stored object
    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.state
            .objects
            .lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Multipart uploads neither completed nor aborted
    pub fn open_uploads(&self) -> usize {
        self.state.uploads.lock().len()
    }
}

impl Drop for StubS3Server {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_object(
    State(state): State<Arc<StubState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let key = key.trim_start_matches('/').to_string();
    let operation = Operation::classify(&method, &query);
    debug!(?operation, bucket = %bucket, key = %key, "stub request");

    let request = RecordedRequest {
        method,
        operation,
        bucket: bucket.clone(),
        key: key.clone(),
        query,
        headers,
        body,
    };
    let payload = request.payload();
    let upload_id = request.query.get("uploadId").cloned().unwrap_or_default();
    let part_number = request
        .query
        .get("partNumber")
        .and_then(|n| n.parse::<i32>().ok());

    let request_number = {
        let mut requests = state.requests.lock();
        requests.push(request);
        requests.len()
    };
    let request_id = format!("STUB{:012}", request_number);
    let resource = format!("/{}/{}", bucket, key);

    let failure = state.failure.lock().clone();
    if let Some(failure) = failure.filter(|f| f.applies_to(operation)) {
        return error_response(&failure, &resource, &request_id);
    }

    let etag = format!("\"{:032x}\"", request_number);
    match operation {
        Operation::PutObject => {
            state.objects.lock().insert((bucket, key), payload);
            ok_with_etag(&etag, request_id)
        }
        Operation::DeleteObject => {
            state.objects.lock().remove(&(bucket, key));
            no_content(request_id)
        }
        Operation::CreateMultipartUpload => {
            let upload_id = format!(
                "upload-{}",
                state.next_upload_id.fetch_add(1, Ordering::Relaxed) + 1
            );
            state.uploads.lock().insert(upload_id.clone(), BTreeMap::new());
            xml_response(
                request_id,
                format!(
                    "<InitiateMultipartUploadResult xmlns=\"{}\"><Bucket>{}</Bucket><Key>{}</Key><UploadId>{}</UploadId></InitiateMultipartUploadResult>",
                    S3_XMLNS,
                    escape_xml(&bucket),
                    escape_xml(&key),
                    upload_id
                ),
            )
        }
        Operation::UploadPart => {
            let mut uploads = state.uploads.lock();
            match (uploads.get_mut(&upload_id), part_number) {
                (Some(parts), Some(number)) => {
                    parts.insert(number, payload);
                    ok_with_etag(&etag, request_id)
                }
                _ => no_such_upload(&resource, &request_id),
            }
        }
        Operation::CompleteMultipartUpload => {
            let Some(parts) = state.uploads.lock().remove(&upload_id) else {
                return no_such_upload(&resource, &request_id);
            };
            let mut data = BytesMut::new();
            for part in parts.values() {
                data.extend_from_slice(part);
            }
            state
                .objects
                .lock()
                .insert((bucket.clone(), key.clone()), data.freeze());

            xml_response(
                request_id,
                format!(
                    "<CompleteMultipartUploadResult xmlns=\"{}\"><Location>{}{}</Location><Bucket>{}</Bucket><Key>{}</Key><ETag>{}</ETag></CompleteMultipartUploadResult>",
                    S3_XMLNS,
                    state.base_url,
                    escape_xml(&resource),
                    escape_xml(&bucket),
                    escape_xml(&key),
                    escape_xml(&etag)
                ),
            )
        }
        Operation::AbortMultipartUpload => {
            state.uploads.lock().remove(&upload_id);
            no_content(request_id)
        }
        Operation::Unsupported => error_response(
            &StubFailure {
                operation: None,
                status: StatusCode::METHOD_NOT_ALLOWED,
                code: "MethodNotAllowed".to_string(),
                message: "The specified method is not allowed against this resource.".to_string(),
            },
            &resource,
            &request_id,
        ),
    }
}

const S3_XMLNS: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

fn request_id_header() -> header::HeaderName {
    header::HeaderName::from_static("x-amz-request-id")
}

fn ok_with_etag(etag: &str, request_id: String) -> Response {
    (
        StatusCode::OK,
        [
            (header::ETAG, etag.to_string()),
            (request_id_header(), request_id),
        ],
    )
        .into_response()
}

fn no_content(request_id: String) -> Response {
    (StatusCode::NO_CONTENT, [(request_id_header(), request_id)]).into_response()
}

fn xml_response(request_id: String, body: String) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/xml".to_string()),
            (request_id_header(), request_id),
        ],
        format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", body),
    )
        .into_response()
}

fn no_such_upload(resource: &str, request_id: &str) -> Response {
    error_response(
        &StubFailure {
            operation: None,
            status: StatusCode::NOT_FOUND,
            code: "NoSuchUpload".to_string(),
            message: "The specified upload does not exist.".to_string(),
        },
        resource,
        request_id,
    )
}

fn error_response(failure: &StubFailure, resource: &str, request_id: &str) -> Response {
    (
        failure.status,
        [(header::CONTENT_TYPE, "application/xml")],
        format_error(&failure.code, &failure.message, resource, request_id),
    )
        .into_response()
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Format an S3-style XML error body
pub fn format_error(code: &str, message: &str, resource: &str, request_id: &str) -> String {
    let resource_line = if !resource.is_empty() {
        format!("  <Resource>{}</Resource>\n", escape_xml(resource))
    } else {
        String::new()
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>{}</Code>
  <Message>{}</Message>
{}  <RequestId>{}</RequestId>
</Error>"#,
        code,
        escape_xml(message),
        resource_line,
        request_id
    )
}

/// Errors that can occur with the stub server
#[derive(Debug)]
pub enum TestError {
    StartFailed(String),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::StartFailed(msg) => write!(f, "Failed to start stub server: {}", msg),
        }
    }
}

impl std::error::Error for TestError {}
