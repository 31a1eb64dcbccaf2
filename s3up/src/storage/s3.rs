//! Amazon S3 backend
//!
//! Uploads are managed: a body that fits in one part is sent with a single
//! `PutObject`; anything larger, or of unknown length, is read part by part
//! and sent as a multipart upload with a bounded number of parts in flight.

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::complete_multipart_upload::CompleteMultipartUploadError;
use aws_sdk_s3::operation::create_multipart_upload::CreateMultipartUploadError;
use aws_sdk_s3::operation::delete_object::DeleteObjectError;
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::operation::upload_part::UploadPartError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, ObjectCannedAcl};
use aws_sdk_s3::Client;
use aws_smithy_types::byte_stream::error::Error as ByteStreamError;
use bytes::{Bytes, BytesMut};
use futures::{future, stream, StreamExt, TryStreamExt};
use s3up_core::UploaderConfig;
use thiserror::Error;
use tracing::{debug, warn};

use super::traits::{ObjectStore, UploadOutput, UploadRequest};
use crate::location::ObjectLocator;

/// Provider name reported by the SDK for the static credentials
const CREDENTIALS_PROVIDER: &str = "s3up";

/// Smallest part S3 accepts, except for the last one
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Most parts a single multipart upload may have
pub const MAX_PARTS: u64 = 10_000;

/// Parts uploaded concurrently by default
pub const DEFAULT_QUEUE_SIZE: usize = 4;

/// Error from [`S3Backend::upload`].
///
/// Each SDK variant carries the error of the request that failed, exactly as
/// the SDK returned it.
#[derive(Debug, Error)]
pub enum S3UploadError {
    #[error(transparent)]
    PutObject(#[from] SdkError<PutObjectError>),

    #[error(transparent)]
    CreateMultipartUpload(#[from] SdkError<CreateMultipartUploadError>),

    #[error(transparent)]
    UploadPart(#[from] SdkError<UploadPartError>),

    #[error(transparent)]
    CompleteMultipartUpload(#[from] SdkError<CompleteMultipartUploadError>),

    #[error("failed to read upload body: {0}")]
    Body(#[from] ByteStreamError),

    #[error("CreateMultipartUpload response carried no upload id")]
    MissingUploadId,
}

impl S3UploadError {
    /// S3 error code, when the service answered with an error
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::PutObject(e) => e.as_service_error().and_then(|e| e.code()),
            Self::CreateMultipartUpload(e) => e.as_service_error().and_then(|e| e.code()),
            Self::UploadPart(e) => e.as_service_error().and_then(|e| e.code()),
            Self::CompleteMultipartUpload(e) => e.as_service_error().and_then(|e| e.code()),
            Self::Body(_) | Self::MissingUploadId => None,
        }
    }

    /// S3 error message, when the service answered with an error
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::PutObject(e) => e.as_service_error().and_then(|e| e.message()),
            Self::CreateMultipartUpload(e) => e.as_service_error().and_then(|e| e.message()),
            Self::UploadPart(e) => e.as_service_error().and_then(|e| e.message()),
            Self::CompleteMultipartUpload(e) => e.as_service_error().and_then(|e| e.message()),
            Self::Body(_) | Self::MissingUploadId => None,
        }
    }
}

/// Object store backed by an `aws-sdk-s3` client.
///
/// Each backend owns its client; credentials live in that client's config and
/// nowhere else.
#[derive(Debug, Clone)]
pub struct S3Backend {
    client: Client,
    locator: ObjectLocator,
    part_size: usize,
    queue_size: usize,
}

impl S3Backend {
    /// Build a client from the configured credentials, region and endpoint
    pub fn new(config: &UploaderConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.force_path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint.clone());
        }

        Self::from_client(
            Client::from_conf(builder.build()),
            ObjectLocator::from_config(config),
        )
    }

    /// Wrap an existing client
    pub fn from_client(client: Client, locator: ObjectLocator) -> Self {
        Self {
            client,
            locator,
            part_size: MIN_PART_SIZE,
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }

    /// Set the part size for multipart uploads.
    ///
    /// S3 rejects parts below [`MIN_PART_SIZE`] other than the last one. The
    /// size grows as needed to keep bodies of known length within
    /// [`MAX_PARTS`].
    #[must_use]
    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size.max(1);
        self
    }

    /// Set how many parts are uploaded at once
    #[must_use]
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size.max(1);
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn locator(&self) -> &ObjectLocator {
        &self.locator
    }

    pub fn part_size(&self) -> usize {
        self.part_size
    }

    /// Part size for a body of `len` bytes
    fn part_size_for(&self, len: u64) -> usize {
        let needed = usize::try_from(len.div_ceil(MAX_PARTS)).unwrap_or(usize::MAX);
        self.part_size.max(needed)
    }

    async fn put_single(
        &self,
        target: &ObjectTarget,
        body: ByteStream,
    ) -> Result<Option<String>, S3UploadError> {
        debug!(bucket = %target.bucket, key = %target.key, "sending PutObject");

        let output = self
            .client
            .put_object()
            .set_acl(target.acl.clone())
            .bucket(&target.bucket)
            .body(body)
            .key(&target.key)
            .content_type(&target.content_type)
            .cache_control(&target.cache_control)
            .send()
            .await?;

        Ok(output.e_tag().map(ToString::to_string))
    }

    async fn put_multipart(
        &self,
        target: &ObjectTarget,
        first: Part,
        rest: PartReader,
    ) -> Result<Option<String>, S3UploadError> {
        let created = self
            .client
            .create_multipart_upload()
            .set_acl(target.acl.clone())
            .bucket(&target.bucket)
            .key(&target.key)
            .content_type(&target.content_type)
            .cache_control(&target.cache_control)
            .send()
            .await?;
        let upload_id = created
            .upload_id()
            .ok_or(S3UploadError::MissingUploadId)?
            .to_string();

        debug!(bucket = %target.bucket, key = %target.key, upload_id = %upload_id, "multipart upload started");

        let result = match self.upload_parts(target, &upload_id, first, rest).await {
            Ok(parts) => self.complete(target, &upload_id, parts).await,
            Err(e) => Err(e),
        };

        if result.is_err() {
            self.abort(target, &upload_id).await;
        }
        result
    }

    /// Send every part, at most `queue_size` at a time, reading ahead while
    /// earlier parts are in flight
    async fn upload_parts(
        &self,
        target: &ObjectTarget,
        upload_id: &str,
        first: Part,
        rest: PartReader,
    ) -> Result<Vec<CompletedPart>, S3UploadError> {
        let remaining = stream::try_unfold(rest, |mut reader| async move {
            match reader.next_part().await {
                Ok(part) => Ok(part.map(|part| (part, reader))),
                Err(e) => Err(S3UploadError::Body(e)),
            }
        });

        let mut parts: Vec<CompletedPart> = stream::once(future::ready(Ok(first)))
            .chain(remaining)
            .map_ok(|part| self.upload_part(target, upload_id, part))
            .try_buffer_unordered(self.queue_size)
            .try_collect()
            .await?;

        parts.sort_by_key(CompletedPart::part_number);
        Ok(parts)
    }

    async fn upload_part(
        &self,
        target: &ObjectTarget,
        upload_id: &str,
        part: Part,
    ) -> Result<CompletedPart, S3UploadError> {
        debug!(key = %target.key, part = part.number, size = part.data.len(), "sending UploadPart");

        let output = self
            .client
            .upload_part()
            .bucket(&target.bucket)
            .key(&target.key)
            .upload_id(upload_id)
            .part_number(part.number)
            .body(ByteStream::from(part.data))
            .send()
            .await?;

        Ok(CompletedPart::builder()
            .set_e_tag(output.e_tag().map(ToString::to_string))
            .part_number(part.number)
            .build())
    }

    async fn complete(
        &self,
        target: &ObjectTarget,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<Option<String>, S3UploadError> {
        debug!(key = %target.key, parts = parts.len(), "sending CompleteMultipartUpload");

        let output = self
            .client
            .complete_multipart_upload()
            .bucket(&target.bucket)
            .key(&target.key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await?;

        Ok(output.e_tag().map(ToString::to_string))
    }

    /// Best effort; the upload error is what the caller gets either way
    async fn abort(&self, target: &ObjectTarget, upload_id: &str) {
        let result = self
            .client
            .abort_multipart_upload()
            .bucket(&target.bucket)
            .key(&target.key)
            .upload_id(upload_id)
            .send()
            .await;

        match result {
            Ok(_) => debug!(key = %target.key, upload_id, "multipart upload aborted"),
            Err(e) => warn!(
                key = %target.key,
                upload_id,
                error = %DisplayErrorContext(&e),
                "failed to abort multipart upload"
            ),
        }
    }
}

/// Map the configured ACL string to the SDK type; empty means none
fn canned_acl(acl: &str) -> Option<ObjectCannedAcl> {
    if acl.is_empty() {
        None
    } else {
        Some(ObjectCannedAcl::from(acl))
    }
}

/// Per-object settings shared by every request of one upload
struct ObjectTarget {
    bucket: String,
    key: String,
    acl: Option<ObjectCannedAcl>,
    content_type: String,
    cache_control: String,
}

/// One numbered slice of the body
#[derive(Debug)]
struct Part {
    number: i32,
    data: Bytes,
}

/// Cuts a body into parts of `part_size` bytes; the last may be shorter
struct PartReader {
    body: ByteStream,
    buffer: BytesMut,
    part_size: usize,
    next_number: i32,
    finished: bool,
}

impl PartReader {
    fn new(body: ByteStream, part_size: usize) -> Self {
        Self {
            body,
            buffer: BytesMut::new(),
            part_size,
            next_number: 1,
            finished: false,
        }
    }

    async fn next_part(&mut self) -> Result<Option<Part>, ByteStreamError> {
        while !self.finished && self.buffer.len() < self.part_size {
            match self.body.next().await {
                Some(chunk) => self.buffer.extend_from_slice(&chunk?),
                None => self.finished = true,
            }
        }

        if self.buffer.is_empty() {
            return Ok(None);
        }

        let len = self.buffer.len().min(self.part_size);
        let part = Part {
            number: self.next_number,
            data: self.buffer.split_to(len).freeze(),
        };
        self.next_number += 1;
        Ok(Some(part))
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    type UploadError = S3UploadError;
    type DeleteError = SdkError<DeleteObjectError>;

    async fn upload(&self, request: UploadRequest) -> Result<UploadOutput, Self::UploadError> {
        let UploadRequest {
            acl,
            bucket,
            body,
            key,
            content_type,
            cache_control,
        } = request;
        let target = ObjectTarget {
            bucket,
            key,
            acl: canned_acl(&acl),
            content_type,
            cache_control,
        };

        let etag = match body.size_hint() {
            (lower, Some(upper)) if lower == upper && upper <= self.part_size as u64 => {
                self.put_single(&target, body).await?
            }
            (_, upper) => {
                let part_size = upper.map_or(self.part_size, |len| self.part_size_for(len));
                let mut reader = PartReader::new(body, part_size);

                match reader.next_part().await? {
                    Some(first) if first.data.len() == part_size => {
                        self.put_multipart(&target, first, reader).await?
                    }
                    // The whole body fit in one part
                    first => {
                        let data = first.map(|part| part.data).unwrap_or_default();
                        self.put_single(&target, ByteStream::from(data)).await?
                    }
                }
            }
        };

        Ok(UploadOutput {
            location: self.locator.location(&target.bucket, &target.key),
            etag,
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), Self::DeleteError> {
        debug!(bucket = %bucket, key = %key, "sending DeleteObject");

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await?;

        Ok(())
    }
}
