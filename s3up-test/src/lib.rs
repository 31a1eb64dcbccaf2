//! Test utilities for s3up
//!
//! Provides an in-process stub S3 endpoint for integration testing:
//! - Start the stub on a random local port
//! - Inspect every request the SDK sent (operation, path, headers, payload)
//! - Read back stored objects, including assembled multipart uploads
//! - Make the stub answer with an S3 error, for every request or one operation
//! - Build SDK clients and uploader configs pointed at the stub
//!
//! ## Usage
//!
//! ```rust,no_run
//! use s3up_test::StubS3Server;
//!
//! #[tokio::test]
//! async fn test_upload() {
//!     let server = StubS3Server::start().await.unwrap();
//!     let config = server.uploader_config("my-bucket");
//!
//!     // ... upload with `config` ...
//!
//!     let request = server.last_request().unwrap();
//!     assert_eq!(request.key, "a/b.png");
//! }
//! ```

pub mod chunked;
pub mod client;
pub mod server;

pub use client::s3_client;
pub use server::{Operation, RecordedRequest, StubFailure, StubS3Server, TestError};

/// Credentials the stub accepts (it accepts anything)
pub const TEST_ACCESS_KEY_ID: &str = "test";
pub const TEST_SECRET_ACCESS_KEY: &str = "test";

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
