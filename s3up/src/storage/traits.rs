//! Storage backend traits

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;

/// Everything a backend needs to store one object.
///
/// Built fresh for every upload and moved into the backend.
#[derive(Debug)]
pub struct UploadRequest {
    /// Canned ACL; empty means no ACL is sent
    pub acl: String,
    pub bucket: String,
    pub body: ByteStream,
    pub key: String,
    pub content_type: String,
    pub cache_control: String,
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutput {
    /// Public URL of the stored object
    pub location: String,
    pub etag: Option<String>,
}

/// Abstract object store the uploader delegates to.
///
/// Errors are the backend's own; callers see them exactly as produced.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    type UploadError: std::error::Error + Send + Sync + 'static;
    type DeleteError: std::error::Error + Send + Sync + 'static;

    /// Store the request body under `request.bucket`/`request.key`
    async fn upload(&self, request: UploadRequest) -> Result<UploadOutput, Self::UploadError>;

    /// Remove an object. Removing a missing key is not an error.
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), Self::DeleteError>;
}
