//! Public object URLs
//!
//! `PutObject` responses carry no location, so the URL of an uploaded object
//! is derived from the region or custom endpoint and the addressing style.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use s3up_core::UploaderConfig;
use std::net::Ipv4Addr;
use url::Url;

/// Characters left as-is in object keys: unreserved plus the `/` separator
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Builds the URL an object is reachable at after upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocator {
    scheme: String,
    /// Host, with `:port` when one is set
    host: String,
    /// Path prefix of the endpoint, without trailing slash
    base_path: String,
    path_style: bool,
}

impl ObjectLocator {
    /// Locator for `s3.{region}.amazonaws.com`
    pub fn aws(region: &str, path_style: bool) -> Self {
        Self {
            scheme: "https".to_string(),
            host: format!("s3.{}.amazonaws.com", region),
            base_path: String::new(),
            path_style,
        }
    }

    /// Locator for an S3-compatible endpoint such as `http://localhost:9000`.
    ///
    /// An endpoint that does not parse as an absolute URL is used verbatim as
    /// a path-style prefix.
    pub fn endpoint(endpoint: &str, path_style: bool) -> Self {
        match Url::parse(endpoint).ok().filter(Url::has_host) {
            Some(url) => {
                let host = url.host_str().unwrap_or_default();
                let host = match url.port() {
                    Some(port) => format!("{}:{}", host, port),
                    None => host.to_string(),
                };
                Self {
                    scheme: url.scheme().to_string(),
                    host,
                    base_path: url.path().trim_end_matches('/').to_string(),
                    path_style,
                }
            }
            None => {
                let (scheme, rest) = endpoint.split_once("://").unwrap_or(("https", endpoint));
                Self {
                    scheme: scheme.to_string(),
                    host: rest.trim_end_matches('/').to_string(),
                    base_path: String::new(),
                    path_style: true,
                }
            }
        }
    }

    pub fn from_config(config: &UploaderConfig) -> Self {
        match &config.endpoint {
            Some(endpoint) => Self::endpoint(endpoint, config.force_path_style),
            None => Self::aws(&config.region, config.force_path_style),
        }
    }

    /// URL of `key` in `bucket`.
    ///
    /// Buckets that cannot be a DNS label of this host are addressed
    /// path-style, as the SDK addresses them.
    pub fn location(&self, bucket: &str, key: &str) -> String {
        let key = encode_key(key);
        if self.path_style || !is_virtual_hostable(bucket, self.scheme != "https") {
            format!(
                "{}://{}{}/{}/{}",
                self.scheme, self.host, self.base_path, bucket, key
            )
        } else {
            format!(
                "{}://{}.{}{}/{}",
                self.scheme, bucket, self.host, self.base_path, key
            )
        }
    }
}

/// Whether `bucket` can be put in front of the host name.
///
/// Dotted names break the `*.s3` wildcard certificate, so they only qualify
/// over plain HTTP.
fn is_virtual_hostable(bucket: &str, allow_dots: bool) -> bool {
    let bytes = bucket.as_bytes();
    let valid_chars = bytes.iter().all(|&b| {
        b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || (allow_dots && b == b'.')
    });
    let alphanumeric_ends = matches!(
        (bytes.first(), bytes.last()),
        (Some(first), Some(last)) if first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric()
    );

    (3..=63).contains(&bucket.len())
        && valid_chars
        && alphanumeric_ends
        && !bucket.contains("..")
        && !bucket.contains(".-")
        && !bucket.contains("-.")
        && bucket.parse::<Ipv4Addr>().is_err()
}

/// Percent-encode an object key, keeping `/` separators
pub fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_ENCODE_SET).to_string()
}
