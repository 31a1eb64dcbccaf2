//! `aws-chunked` payload decoding
//!
//! The SDK may frame upload bodies as `aws-chunked` so it can append a
//! checksum trailer. The stub records raw bodies; this strips the framing.

use axum::http::{header, HeaderMap};
use bytes::Bytes;

/// Whether a request body uses `aws-chunked` framing
pub fn is_aws_chunked(headers: &HeaderMap) -> bool {
    let encoded = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|e| e.trim() == "aws-chunked"));

    encoded || headers.contains_key("x-amz-decoded-content-length")
}

/// Concatenate the chunk data of an `aws-chunked` body.
///
/// Returns `None` if the framing is malformed. Trailers after the final
/// zero-length chunk are ignored.
pub fn decode_aws_chunked(body: &[u8]) -> Option<Bytes> {
    let mut decoded = Vec::with_capacity(body.len());
    let mut rest = body;

    loop {
        let line_end = find_crlf(rest)?;
        let size_line = std::str::from_utf8(&rest[..line_end]).ok()?;
        // Chunk extensions (e.g. `;chunk-signature=...`) follow the size
        let size_hex = size_line.split(';').next()?.trim();
        let size = usize::from_str_radix(size_hex, 16).ok()?;
        rest = &rest[line_end + 2..];

        if size == 0 {
            return Some(Bytes::from(decoded));
        }
        if rest.len() < size + 2 || &rest[size..size + 2] != b"\r\n" {
            return None;
        }

        decoded.extend_from_slice(&rest[..size]);
        rest = &rest[size + 2..];
    }
}

fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == b"\r\n")
}
