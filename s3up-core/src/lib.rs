//! Core types for s3up
//!
//! This crate provides the uploader configuration and the errors raised while
//! validating it. It has no dependency on the storage SDK.

pub mod config;
pub mod error;

pub use config::{UploaderConfig, DEFAULT_ACL, DEFAULT_CACHE_CONTROL, DEFAULT_REGION};
pub use error::ConfigurationError;
