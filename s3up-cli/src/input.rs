//! Upload sources

use anyhow::{bail, Context};
use s3up::{stream_body, ByteStream};
use std::path::Path;
use tokio_util::io::ReaderStream;

/// Path that stands for standard input
pub const STDIN: &str = "-";

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

fn is_stdin(path: &Path) -> bool {
    path == Path::new(STDIN)
}

/// Content type for `path`: the explicit one if given, else guessed from the
/// extension
pub fn content_type(path: &Path, explicit: Option<&str>) -> String {
    if let Some(content_type) = explicit {
        return content_type.to_string();
    }
    if is_stdin(path) {
        return FALLBACK_CONTENT_TYPE.to_string();
    }

    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string()
}

/// Open `path` (or stdin) as an upload body.
///
/// Regular files are sent with their known length. Stdin, pipes and other
/// non-regular files report no usable length and are streamed instead.
pub async fn open(path: &Path) -> anyhow::Result<ByteStream> {
    if is_stdin(path) {
        return Ok(stream_body(ReaderStream::new(tokio::io::stdin())));
    }

    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    if metadata.is_dir() {
        bail!("{} is a directory", path.display());
    }

    if !metadata.is_file() {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        return Ok(stream_body(ReaderStream::new(file)));
    }

    ByteStream::from_path(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))
}
