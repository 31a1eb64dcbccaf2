//! Upload bodies of unknown length

use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use http_body::Frame;
use http_body_util::StreamBody;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Wrap a stream of chunks as an unsized [`ByteStream`].
///
/// The total length is not known up front, so `Uploader::upload` sends it in
/// parts once it grows past one part.
pub fn stream_body<S, E>(stream: S) -> ByteStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + Sync + 'static,
    E: Into<BoxError> + 'static,
{
    ByteStream::from_body_1_x(StreamBody::new(stream.map_ok(Frame::data)))
}
