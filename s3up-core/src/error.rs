//! Configuration errors

use thiserror::Error;

/// Raised when an uploader is built from an unusable configuration.
///
/// Upload and delete failures are not represented here: those come from the
/// storage backend and reach the caller unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("access key id and secret access key are not configured")]
    MissingCredentials,

    #[error("access key id is not configured")]
    MissingAccessKeyId,

    #[error("secret access key is not configured")]
    MissingSecretAccessKey,
}

impl ConfigurationError {
    /// Pick the variant describing which credential fields are empty, if any.
    pub fn check_credentials(access_key_id: &str, secret_access_key: &str) -> Result<(), Self> {
        match (access_key_id.is_empty(), secret_access_key.is_empty()) {
            (true, true) => Err(Self::MissingCredentials),
            (true, false) => Err(Self::MissingAccessKeyId),
            (false, true) => Err(Self::MissingSecretAccessKey),
            (false, false) => Ok(()),
        }
    }
}
