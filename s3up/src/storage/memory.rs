//! In-memory object store

use async_trait::async_trait;
use aws_smithy_types::byte_stream::error::Error as ByteStreamError;
use bytes::Bytes;
use dashmap::DashMap;
use md5::{Digest, Md5};
use thiserror::Error;

use super::traits::{ObjectStore, UploadOutput, UploadRequest};
use crate::location::ObjectLocator;

/// Endpoint used for locations when none is given
const DEFAULT_ENDPOINT: &str = "memory://local";

/// Errors from the in-memory store
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error("failed to read upload body: {0}")]
    Body(#[from] ByteStreamError),
}

/// An object held by [`MemoryStore`], with the headers it was uploaded with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub etag: String,
    pub acl: String,
    pub content_type: String,
    pub cache_control: String,
}

/// Object store that keeps everything in process memory
#[derive(Debug)]
pub struct MemoryStore {
    objects: DashMap<(String, String), StoredObject>,
    locator: ObjectLocator,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Report locations as path-style URLs under `endpoint`
    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            objects: DashMap::new(),
            locator: ObjectLocator::endpoint(endpoint, true),
        }
    }

    /// Get a copy of a stored object
    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn compute_etag(data: &[u8]) -> String {
        let mut hasher = Md5::new();
        hasher.update(data);
        format!("\"{}\"", hex::encode(hasher.finalize()))
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    type UploadError = MemoryStoreError;
    type DeleteError = MemoryStoreError;

    async fn upload(&self, request: UploadRequest) -> Result<UploadOutput, Self::UploadError> {
        let data = request.body.collect().await?.into_bytes();
        let etag = Self::compute_etag(&data);
        let location = self.locator.location(&request.bucket, &request.key);

        self.objects.insert(
            (request.bucket, request.key),
            StoredObject {
                data,
                etag: etag.clone(),
                acl: request.acl,
                content_type: request.content_type,
                cache_control: request.cache_control,
            },
        );

        Ok(UploadOutput {
            location,
            etag: Some(etag),
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), Self::DeleteError> {
        self.objects.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}
