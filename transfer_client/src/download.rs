use std::path::{Path, PathBuf};

use file_utils::{staging_file_in, DEFAULT_MIME_TYPE};
use futures::StreamExt;
use progress_tracking::{DownloadProgressStream, ProgressSink, StreamProgressReporter};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Client;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use crate::error::{Result, TransferError};

/// Fetch `url` and store the body at `destination`.
#[derive(Clone, Debug)]
pub struct DownloadRequest {
    pub url: String,
    pub destination: PathBuf,
    pub headers: Vec<(String, String)>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A response body held in a staging file, waiting to be moved into place.
pub(crate) struct FetchedBody {
    pub(crate) staged: NamedTempFile,
    pub(crate) mime_type: String,
}

/// The media type of a Content-Type header, without parameters.
fn media_type(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_owned())
}

/// Streams the response for `url` into a staging file. Nothing is created on disk
/// unless the server answers with a success status.
pub(crate) async fn fetch_to_staging(
    client: Client,
    url: Url,
    headers: HeaderMap,
    staging_dir: &Path,
    progress: ProgressSink,
) -> Result<FetchedBody> {
    let response = client.get(url.clone()).headers(headers).send().await?;

    let status = response.status();
    if !status.is_success() {
        debug!("GET {url}: server answered {status}");
        return Err(TransferError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let mime_type = media_type(response.headers());
    // Unknown length is reported as 0, which suppresses progress callbacks.
    let total = response.content_length().unwrap_or(0);
    debug!("GET {url}: {status}, {total} bytes of {mime_type}");

    let staged = staging_file_in(staging_dir)?;
    let mut writer = tokio::fs::File::from_std(staged.as_file().try_clone()?);

    let reporter = StreamProgressReporter::new(total, progress);
    let mut body = DownloadProgressStream::wrap_stream(response.bytes_stream(), reporter);
    while let Some(chunk) = body.next().await {
        writer.write_all(&chunk?).await?;
    }
    writer.flush().await?;
    writer.sync_all().await?;

    Ok(FetchedBody { staged, mime_type })
}
