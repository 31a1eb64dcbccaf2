//! Integration tests for the S3 backend
//!
//! These tests drive `Uploader` through the real AWS SDK against an
//! in-process stub S3 endpoint and check what went over the wire.

use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use s3up::{stream_body, ObjectLocator, S3Backend, S3UploadError, Uploader};
use s3up_test::{init_tracing, s3_client, Operation, StubS3Server};
use std::convert::Infallible;

async fn start() -> StubS3Server {
    init_tracing();
    StubS3Server::start().await.unwrap()
}

/// A body of unknown length made of `chunks`
fn streamed(chunks: &[&'static str]) -> ByteStream {
    let chunks: Vec<Result<Bytes, Infallible>> = chunks
        .iter()
        .map(|c| Ok(Bytes::from_static(c.as_bytes())))
        .collect();
    stream_body(futures::stream::iter(chunks))
}

/// Uploader whose backend cuts bodies into `part_size` byte parts
fn small_parts_uploader(server: &StubS3Server, part_size: usize) -> Uploader {
    let config = server.uploader_config("assets");
    let backend = S3Backend::new(&config).with_part_size(part_size);
    Uploader::with_backend(config, backend).unwrap()
}

#[tokio::test]
async fn test_upload_returns_path_style_location() {
    let server = start().await;
    let uploader = Uploader::new(server.uploader_config("assets")).unwrap();

    let location = uploader
        .upload(ByteStream::from_static(b"\x89PNG"), "coin/demo.png", "image/png")
        .await
        .unwrap();

    assert_eq!(location, format!("{}/assets/coin/demo.png", server.url()));
}

#[tokio::test]
async fn test_upload_sends_configured_headers() {
    let server = start().await;
    let config = server
        .uploader_config("assets")
        .with_cache_control("max-age=60")
        .with_acl("public-read");
    let uploader = Uploader::new(config).unwrap();

    uploader
        .upload(ByteStream::from_static(b"image-bytes"), "a/b.png", "image/png")
        .await
        .unwrap();

    let request = server.last_request().unwrap();
    assert_eq!(request.method, "PUT");
    assert_eq!(request.bucket, "assets");
    assert_eq!(request.key, "a/b.png");
    assert_eq!(request.header("x-amz-acl"), Some("public-read"));
    assert_eq!(request.header("content-type"), Some("image/png"));
    assert_eq!(request.header("cache-control"), Some("max-age=60"));
    assert_eq!(request.payload().as_ref(), b"image-bytes");
}

#[tokio::test]
async fn test_default_cache_control_is_sent() {
    let server = start().await;
    let uploader = Uploader::new(server.uploader_config("assets")).unwrap();

    uploader
        .upload(ByteStream::from_static(b"x"), "k", "text/plain")
        .await
        .unwrap();

    let request = server.last_request().unwrap();
    assert_eq!(
        request.header("cache-control"),
        Some("no-cache, no-store, max-age=0, s-maxage=0")
    );
}

#[tokio::test]
async fn test_empty_acl_sends_no_acl_header() {
    let server = start().await;
    let uploader = Uploader::new(server.uploader_config("assets").with_acl("")).unwrap();

    uploader
        .upload(ByteStream::from_static(b"x"), "k", "text/plain")
        .await
        .unwrap();

    assert_eq!(server.last_request().unwrap().header("x-amz-acl"), None);
}

#[tokio::test]
async fn test_upload_error_is_sdk_error() {
    let server = start().await;
    server.fail_with(403, "AccessDenied", "Access Denied");
    let uploader = Uploader::new(server.uploader_config("assets")).unwrap();

    let err = uploader
        .upload(ByteStream::from_static(b"x"), "k", "text/plain")
        .await
        .unwrap_err();

    let S3UploadError::PutObject(sdk_error) = &err else {
        panic!("expected a PutObject error, got {:?}", err);
    };
    let service_error = sdk_error.as_service_error().expect("service error");
    assert_eq!(service_error.code(), Some("AccessDenied"));
    assert_eq!(service_error.message(), Some("Access Denied"));
    assert_eq!(err.code(), Some("AccessDenied"));
}

#[tokio::test]
async fn test_streamed_body_of_unknown_length() {
    let server = start().await;
    let uploader = Uploader::new(server.uploader_config("assets")).unwrap();

    let location = uploader
        .upload(streamed(&["hello ", "from ", "a stream"]), "streamed.txt", "text/plain")
        .await
        .unwrap();

    assert_eq!(location, format!("{}/assets/streamed.txt", server.url()));
    assert_eq!(server.operations(), vec![Operation::PutObject]);
    assert_eq!(
        server.object("assets", "streamed.txt").as_deref(),
        Some(&b"hello from a stream"[..])
    );
}

#[tokio::test]
async fn test_large_streamed_body_goes_multipart() {
    let server = start().await;
    let uploader = small_parts_uploader(&server, 4);

    let location = uploader
        .upload(streamed(&["abc", "defgh", "ij"]), "big/file.bin", "application/zip")
        .await
        .unwrap();

    assert_eq!(location, format!("{}/assets/big/file.bin", server.url()));
    assert_eq!(
        server.operations(),
        vec![
            Operation::CreateMultipartUpload,
            Operation::UploadPart,
            Operation::UploadPart,
            Operation::UploadPart,
            Operation::CompleteMultipartUpload,
        ]
    );
    assert_eq!(
        server.object("assets", "big/file.bin").as_deref(),
        Some(&b"abcdefghij"[..])
    );
    assert_eq!(server.open_uploads(), 0);

    // Object headers go on the request that creates the upload
    let create = &server.requests()[0];
    assert_eq!(create.header("x-amz-acl"), Some("public-read"));
    assert_eq!(create.header("content-type"), Some("application/zip"));
    assert_eq!(
        create.header("cache-control"),
        Some("no-cache, no-store, max-age=0, s-maxage=0")
    );
}

#[tokio::test]
async fn test_large_sized_body_goes_multipart() {
    let server = start().await;
    let uploader = small_parts_uploader(&server, 4);

    uploader
        .upload(ByteStream::from_static(b"0123456789"), "sized.bin", "application/octet-stream")
        .await
        .unwrap();

    let parts = server
        .operations()
        .into_iter()
        .filter(|op| *op == Operation::UploadPart)
        .count();
    assert_eq!(parts, 3);
    assert_eq!(
        server.object("assets", "sized.bin").as_deref(),
        Some(&b"0123456789"[..])
    );
}

#[tokio::test]
async fn test_failed_part_aborts_the_upload() {
    let server = start().await;
    server.fail_operation_with(Operation::UploadPart, 403, "AccessDenied", "Access Denied");
    let uploader = small_parts_uploader(&server, 4);

    let err = uploader
        .upload(streamed(&["abcd", "efgh", "ij"]), "broken.bin", "text/plain")
        .await
        .unwrap_err();

    assert!(matches!(err, S3UploadError::UploadPart(_)));
    assert_eq!(err.code(), Some("AccessDenied"));
    assert!(server.operations().contains(&Operation::AbortMultipartUpload));
    assert_eq!(server.open_uploads(), 0);
    assert!(server.object("assets", "broken.bin").is_none());
}

#[tokio::test]
async fn test_upload_succeeds_after_failure_is_cleared() {
    let server = start().await;
    server.fail_with(403, "AccessDenied", "Access Denied");
    let uploader = Uploader::new(server.uploader_config("assets")).unwrap();

    assert!(uploader
        .upload(ByteStream::from_static(b"x"), "k", "text/plain")
        .await
        .is_err());

    server.clear_failure();
    uploader
        .upload(ByteStream::from_static(b"x"), "k", "text/plain")
        .await
        .unwrap();
    assert_eq!(server.object("assets", "k").as_deref(), Some(&b"x"[..]));
}

#[tokio::test]
async fn test_delete_sends_delete_request() {
    let server = start().await;
    let uploader = Uploader::new(server.uploader_config("assets")).unwrap();

    uploader.delete("old/file.txt").await.unwrap();

    let request = server.last_request().unwrap();
    assert_eq!(request.method, "DELETE");
    assert_eq!(request.bucket, "assets");
    assert_eq!(request.key, "old/file.txt");
}

#[tokio::test]
async fn test_delete_error_is_sdk_error() {
    let server = start().await;
    server.fail_with(404, "NoSuchBucket", "The specified bucket does not exist");
    let uploader = Uploader::new(server.uploader_config("missing")).unwrap();

    let err = uploader.delete("k").await.unwrap_err();
    assert_eq!(
        err.as_service_error().and_then(|e| e.code()),
        Some("NoSuchBucket")
    );
}

#[tokio::test]
async fn test_keys_with_spaces_round_trip() {
    let server = start().await;
    let uploader = Uploader::new(server.uploader_config("assets")).unwrap();

    let location = uploader
        .upload(ByteStream::from_static(b"x"), "my photos/cat 1.jpg", "image/jpeg")
        .await
        .unwrap();

    assert_eq!(
        location,
        format!("{}/assets/my%20photos/cat%201.jpg", server.url())
    );
    assert_eq!(server.last_request().unwrap().key, "my photos/cat 1.jpg");
}

#[tokio::test]
async fn test_concurrent_uploads_resolve_independently() {
    let server = start().await;
    let uploader = Uploader::new(server.uploader_config("assets")).unwrap();

    let (first, second) = futures::future::join(
        uploader.upload(ByteStream::from_static(b"1"), "first.txt", "text/plain"),
        uploader.upload(ByteStream::from_static(b"2"), "second.txt", "text/plain"),
    )
    .await;

    assert_eq!(first.unwrap(), format!("{}/assets/first.txt", server.url()));
    assert_eq!(second.unwrap(), format!("{}/assets/second.txt", server.url()));
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn test_shared_client_backend() {
    let server = start().await;
    let client = s3_client(&server.url()).await;
    let backend = S3Backend::from_client(client, ObjectLocator::endpoint(&server.url(), true));
    let uploader = Uploader::with_backend(server.uploader_config("assets"), backend).unwrap();

    let location = uploader
        .upload(ByteStream::from_static(b"shared"), "shared.txt", "text/plain")
        .await
        .unwrap();

    assert_eq!(location, format!("{}/assets/shared.txt", server.url()));
    assert_eq!(server.last_request().unwrap().payload().as_ref(), b"shared");
}
