//! Uploader configuration

use serde::Deserialize;
use std::fmt;

use crate::error::ConfigurationError;

/// Cache-Control applied to uploaded objects unless configured otherwise
pub const DEFAULT_CACHE_CONTROL: &str = "no-cache, no-store, max-age=0, s-maxage=0";

/// Canned ACL applied to uploaded objects unless configured otherwise
pub const DEFAULT_ACL: &str = "public-read";

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Credentials, target bucket and per-object defaults for an uploader.
///
/// Field names deserialize from snake_case and also accept the camelCase
/// option names (`accessKeyId`, `bucketName`, ...).
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct UploaderConfig {
    #[serde(default, alias = "accessKeyId")]
    pub access_key_id: String,

    #[serde(default, alias = "secretAccessKey")]
    pub secret_access_key: String,

    #[serde(default, alias = "bucketName", alias = "bucket")]
    pub bucket_name: String,

    /// CDN distribution in front of the bucket. Not used when uploading.
    #[serde(default, alias = "distributionId")]
    pub distribution_id: Option<String>,

    #[serde(default = "default_cache_control", alias = "cacheControl")]
    pub cache_control: String,

    /// Canned ACL. An empty string sends no ACL at all.
    #[serde(default = "default_acl")]
    pub acl: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint for S3-compatible services
    #[serde(default, alias = "endpointUrl")]
    pub endpoint: Option<String>,

    #[serde(default, alias = "forcePathStyle")]
    pub force_path_style: bool,
}

fn default_cache_control() -> String {
    DEFAULT_CACHE_CONTROL.to_string()
}

fn default_acl() -> String {
    DEFAULT_ACL.to_string()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl UploaderConfig {
    /// Create a configuration with the default cache-control, ACL and region
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        bucket_name: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            bucket_name: bucket_name.into(),
            distribution_id: None,
            cache_control: default_cache_control(),
            acl: default_acl(),
            region: default_region(),
            endpoint: None,
            force_path_style: false,
        }
    }

    pub fn with_distribution_id(mut self, distribution_id: impl Into<String>) -> Self {
        self.distribution_id = Some(distribution_id.into());
        self
    }

    pub fn with_cache_control(mut self, cache_control: impl Into<String>) -> Self {
        self.cache_control = cache_control.into();
        self
    }

    pub fn with_acl(mut self, acl: impl Into<String>) -> Self {
        self.acl = acl.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_force_path_style(mut self, force_path_style: bool) -> Self {
        self.force_path_style = force_path_style;
        self
    }

    /// Check that both credential fields are set
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        ConfigurationError::check_credentials(&self.access_key_id, &self.secret_access_key)
    }
}

impl fmt::Debug for UploaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploaderConfig")
            .field("access_key_id", &redact(&self.access_key_id))
            .field("secret_access_key", &redact(&self.secret_access_key))
            .field("bucket_name", &self.bucket_name)
            .field("distribution_id", &self.distribution_id)
            .field("cache_control", &self.cache_control)
            .field("acl", &self.acl)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}
