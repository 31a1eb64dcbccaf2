//! Upload byte streams to S3
//!
//! [`Uploader`] holds a validated [`UploaderConfig`] and a storage backend,
//! and turns `upload(body, key, mime_type)` into a single object upload that
//! resolves to the object's public location. Bodies larger than one part, or
//! of unknown length (see [`stream_body`]), go up as multipart uploads.

pub mod body;
pub mod location;
pub mod storage;
pub mod uploader;

pub use body::stream_body;
pub use location::ObjectLocator;
pub use storage::{
    MemoryStore, ObjectStore, S3Backend, S3UploadError, UploadOutput, UploadRequest,
};
pub use uploader::Uploader;

pub use aws_sdk_s3::primitives::ByteStream;
pub use s3up_core::{ConfigurationError, UploaderConfig};
