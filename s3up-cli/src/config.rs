//! Configuration management
//!
//! The base layer is an optional TOML file plus `S3UP_*` environment
//! variables. Command-line flags (each with its own environment variable)
//! override it field by field.

use clap::Args;
use config::builder::DefaultState;
use config::ConfigBuilder;
use s3up::UploaderConfig;
use std::path::Path;

/// Config file looked up in the working directory when none is given
const DEFAULT_CONFIG_FILE: &str = "s3up";

const ENV_PREFIX: &str = "S3UP";

/// Connection and per-object settings given on the command line
#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    /// Access key id
    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key_id: Option<String>,

    /// Secret access key
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_access_key: Option<String>,

    /// Target bucket
    #[arg(long, env = "AWS_S3_BUCKET_NAME")]
    pub bucket: Option<String>,

    /// CDN distribution in front of the bucket
    #[arg(long, env = "DISTRIBUTION_ID")]
    pub distribution_id: Option<String>,

    /// Cache-Control stored with uploaded objects
    #[arg(long, env = "AWS_S3_CACHE_CONTROL")]
    pub cache_control: Option<String>,

    /// Canned ACL for uploaded objects; empty to send none
    #[arg(long, env = "AWS_S3_ACL")]
    pub acl: Option<String>,

    /// Bucket region
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Endpoint of an S3-compatible service
    #[arg(long, env = "AWS_ENDPOINT_URL")]
    pub endpoint: Option<String>,

    /// Address buckets in the path instead of the host name
    #[arg(
        long,
        env = "AWS_S3_FORCE_PATH_STYLE",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub force_path_style: Option<bool>,
}

impl ConnectionArgs {
    /// Overwrite the fields of `config` that were given
    pub fn apply(self, mut config: UploaderConfig) -> UploaderConfig {
        if let Some(access_key_id) = self.access_key_id {
            config.access_key_id = access_key_id;
        }
        if let Some(secret_access_key) = self.secret_access_key {
            config.secret_access_key = secret_access_key;
        }
        if let Some(bucket) = self.bucket {
            config.bucket_name = bucket;
        }
        if let Some(distribution_id) = self.distribution_id {
            config.distribution_id = Some(distribution_id);
        }
        if let Some(cache_control) = self.cache_control {
            config.cache_control = cache_control;
        }
        if let Some(acl) = self.acl {
            config.acl = acl;
        }
        if let Some(region) = self.region {
            config.region = region;
        }
        if let Some(endpoint) = self.endpoint {
            config.endpoint = Some(endpoint);
        }
        if let Some(force_path_style) = self.force_path_style {
            config.force_path_style = force_path_style;
        }
        config
    }
}

/// Load configuration from file and environment
pub fn load(path: Option<&Path>) -> anyhow::Result<UploaderConfig> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    from_builder(config::Config::builder().add_source(file))
}

fn from_builder(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<UploaderConfig> {
    let config = builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX))
        .build()?;

    Ok(config.try_deserialize::<UploaderConfig>()?)
}
