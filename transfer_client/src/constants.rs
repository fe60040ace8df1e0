use std::time::Duration;

use utils::ByteSize;

utils::configurable_constants! {
    /// Chunk size used when copying the source into a staged multipart body, and when
    /// streaming the staged body to the server.
    ref UPLOAD_STAGING_CHUNK_SIZE: ByteSize = ByteSize::new(64 * 1024);

    /// Time allowed to establish a connection.
    ref CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Longest time a transfer may go without reading any bytes from the connection.
    ref READ_TIMEOUT: Duration = Duration::from_secs(60);

    /// Minimum spacing between two progress callbacks of one transfer.
    ref PROGRESS_MIN_INTERVAL: Duration = Duration::from_millis(100);

    /// Form field name of the file part when the caller does not choose one.
    ref UPLOAD_FIELD_NAME: String = "file".to_owned();

    /// Directory holding staged upload bodies and in-flight downloads.
    /// Defaults to the system temp directory.
    ref STAGING_DIR: Option<String> = None;
}

pub(crate) const USER_AGENT: &str = concat!("fs-bridge/", env!("CARGO_PKG_VERSION"));

/// Header carrying the uploaded file's name alongside the multipart body.
pub(crate) const FILENAME_HEADER: &str = "X-Filename";
