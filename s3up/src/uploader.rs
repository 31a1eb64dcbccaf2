//! The uploader facade

use aws_sdk_s3::primitives::ByteStream;
use s3up_core::{ConfigurationError, UploaderConfig};
use tracing::{debug, info};

use crate::storage::{ObjectStore, S3Backend, UploadRequest};

/// Uploads byte streams into the configured bucket.
///
/// The configuration is fixed at construction. `upload` and `delete` take
/// `&self` and keep no per-call state, so one uploader can serve any number
/// of concurrent calls.
#[derive(Debug, Clone)]
pub struct Uploader<S = S3Backend> {
    config: UploaderConfig,
    backend: S,
}

impl Uploader<S3Backend> {
    /// Validate `config` and build an S3 client owned by this uploader
    pub fn new(config: UploaderConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let backend = S3Backend::new(&config);
        Ok(Self { config, backend })
    }
}

impl<S: ObjectStore> Uploader<S> {
    /// Validate `config` and upload through `backend`
    pub fn with_backend(config: UploaderConfig, backend: S) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self { config, backend })
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Upload `body` to `destination_key` and return the object's location.
    ///
    /// ACL, bucket and cache-control come from the configuration. Backend
    /// errors are returned untouched.
    pub async fn upload(
        &self,
        body: ByteStream,
        destination_key: &str,
        mime_type: &str,
    ) -> Result<String, S::UploadError> {
        let request = UploadRequest {
            acl: self.config.acl.clone(),
            bucket: self.config.bucket_name.clone(),
            body,
            key: destination_key.to_string(),
            content_type: mime_type.to_string(),
            cache_control: self.config.cache_control.clone(),
        };

        debug!(
            bucket = %self.config.bucket_name,
            key = destination_key,
            content_type = mime_type,
            "sending upload request"
        );

        let output = self.backend.upload(request).await?;

        info!(location = %output.location, etag = ?output.etag, "upload complete");
        Ok(output.location)
    }

    /// Delete the object at `destination_key` in the configured bucket
    pub async fn delete(&self, destination_key: &str) -> Result<(), S::DeleteError> {
        debug!(bucket = %self.config.bucket_name, key = destination_key, "sending delete request");
        self.backend
            .delete(&self.config.bucket_name, destination_key)
            .await?;
        info!(key = destination_key, "object deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, UploadOutput};
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Backend that answers every upload with the same location
    struct FixedLocation(&'static str);

    #[async_trait]
    impl ObjectStore for FixedLocation {
        type UploadError = TestError;
        type DeleteError = TestError;

        async fn upload(&self, _request: UploadRequest) -> Result<UploadOutput, TestError> {
            Ok(UploadOutput {
                location: self.0.to_string(),
                etag: None,
            })
        }

        async fn delete(&self, _bucket: &str, _key: &str) -> Result<(), TestError> {
            Ok(())
        }
    }

    /// Backend that fails every call with the given error
    struct Failing(TestError);

    #[async_trait]
    impl ObjectStore for Failing {
        type UploadError = TestError;
        type DeleteError = TestError;

        async fn upload(&self, _request: UploadRequest) -> Result<UploadOutput, TestError> {
            Err(self.0.clone())
        }

        async fn delete(&self, _bucket: &str, _key: &str) -> Result<(), TestError> {
            Err(self.0.clone())
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    #[error("{code}: {message}")]
    struct TestError {
        code: &'static str,
        message: &'static str,
    }

    fn config() -> UploaderConfig {
        UploaderConfig::new("AKIA", "secret", "assets")
    }

    fn body(data: &'static str) -> ByteStream {
        ByteStream::from_static(data.as_bytes())
    }

    #[tokio::test]
    async fn test_new_rejects_empty_access_key() {
        let result = Uploader::new(UploaderConfig::new("", "secret", "assets"));
        assert!(matches!(result, Err(ConfigurationError::MissingAccessKeyId)));
    }

    #[tokio::test]
    async fn test_new_rejects_empty_secret_key() {
        let result = Uploader::new(UploaderConfig::new("AKIA", "", "assets"));
        assert!(matches!(result, Err(ConfigurationError::MissingSecretAccessKey)));
    }

    #[test]
    fn test_with_backend_rejects_empty_credentials() {
        let result = Uploader::with_backend(UploaderConfig::new("", "", "assets"), MemoryStore::new());
        assert!(matches!(result, Err(ConfigurationError::MissingCredentials)));
    }

    #[tokio::test]
    async fn test_new_stores_config_with_defaults() {
        let uploader = Uploader::new(config().with_distribution_id("E2DIST")).unwrap();

        assert_eq!(uploader.config(), &config().with_distribution_id("E2DIST"));
        assert_eq!(
            uploader.config().cache_control,
            "no-cache, no-store, max-age=0, s-maxage=0"
        );
        assert_eq!(uploader.config().acl, "public-read");
    }

    #[tokio::test]
    async fn test_upload_returns_backend_location() {
        let uploader =
            Uploader::with_backend(config(), FixedLocation("https://bucket.example/key")).unwrap();

        let location = uploader.upload(body("data"), "key", "text/plain").await.unwrap();
        assert_eq!(location, "https://bucket.example/key");
    }

    #[tokio::test]
    async fn test_upload_passes_backend_error_through() {
        let error = TestError {
            code: "AccessDenied",
            message: "Access Denied",
        };
        let uploader = Uploader::with_backend(config(), Failing(error.clone())).unwrap();

        let result = uploader.upload(body("data"), "key", "text/plain").await;
        assert_eq!(result, Err(error));
    }

    #[tokio::test]
    async fn test_delete_passes_backend_error_through() {
        let error = TestError {
            code: "NoSuchBucket",
            message: "The specified bucket does not exist",
        };
        let uploader = Uploader::with_backend(config(), Failing(error.clone())).unwrap();

        assert_eq!(uploader.delete("key").await, Err(error));
    }

    #[tokio::test]
    async fn test_upload_request_fields() {
        let config = config()
            .with_acl("authenticated-read")
            .with_cache_control("max-age=86400");
        let uploader = Uploader::with_backend(config, MemoryStore::new()).unwrap();

        uploader.upload(body("png-bytes"), "a/b.png", "image/png").await.unwrap();

        let object = uploader.backend().get("assets", "a/b.png").unwrap();
        assert_eq!(object.acl, "authenticated-read");
        assert_eq!(object.content_type, "image/png");
        assert_eq!(object.cache_control, "max-age=86400");
        assert_eq!(object.data.as_ref(), b"png-bytes");
    }

    #[tokio::test]
    async fn test_delete_removes_from_configured_bucket() {
        let uploader = Uploader::with_backend(config(), MemoryStore::new()).unwrap();
        uploader.upload(body("x"), "gone.txt", "text/plain").await.unwrap();

        uploader.delete("gone.txt").await.unwrap();
        assert!(uploader.backend().get("assets", "gone.txt").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_uploads_get_their_own_location() {
        let uploader = Arc::new(Uploader::with_backend(config(), MemoryStore::new()).unwrap());

        let first = {
            let uploader = uploader.clone();
            tokio::spawn(async move { uploader.upload(body("one"), "one.txt", "text/plain").await })
        };
        let second = {
            let uploader = uploader.clone();
            tokio::spawn(async move { uploader.upload(body("two"), "two.txt", "text/plain").await })
        };

        let (first, second) = futures::future::join(first, second).await;
        assert_eq!(first.unwrap().unwrap(), "memory://local/assets/one.txt");
        assert_eq!(second.unwrap().unwrap(), "memory://local/assets/two.txt");
        assert_eq!(uploader.backend().get("assets", "one.txt").unwrap().data.as_ref(), b"one");
        assert_eq!(uploader.backend().get("assets", "two.txt").unwrap().data.as_ref(), b"two");
    }
}
