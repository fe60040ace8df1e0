use std::path::Path;

use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;
use ulid::Ulid;

use crate::error::{Result, TransferError};

/// A `multipart/form-data` request body written out to a staging file, so it can be
/// streamed with a known length.
pub(crate) struct StagedBody {
    pub(crate) file: NamedTempFile,
    pub(crate) len: u64,
    pub(crate) content_type: String,
}

/// What goes into the body: plain text fields followed by one file part.
pub(crate) struct MultipartForm<'a> {
    pub(crate) field_name: &'a str,
    pub(crate) file_name: &'a str,
    pub(crate) mime_type: &'a str,
    pub(crate) fields: &'a [(String, String)],
}

fn new_boundary() -> String {
    format!("----fs-bridge-{}", Ulid::new())
}

/// Quoted-string values in Content-Disposition may not contain quotes or line breaks.
fn escape_disposition_value(value: &str) -> String {
    value.replace('"', "%22").replace('\r', "%0D").replace('\n', "%0A")
}

fn text_part(boundary: &str, name: &str, value: &str) -> String {
    format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{value}\r\n",
        escape_disposition_value(name)
    )
}

fn file_part_header(boundary: &str, form: &MultipartForm<'_>) -> String {
    format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
        escape_disposition_value(form.field_name),
        escape_disposition_value(form.file_name),
        form.mime_type
    )
}

/// Writes the multipart body for `source` into a new staging file in `staging_dir`.
/// The source is copied in `chunk_size` pieces.
pub(crate) async fn stage_multipart_body(
    source: &Path,
    form: &MultipartForm<'_>,
    staging_dir: &Path,
    chunk_size: usize,
) -> Result<StagedBody> {
    let boundary = new_boundary();
    let staged = file_utils::staging_file_in(staging_dir)?;
    let mut writer = tokio::fs::File::from_std(staged.as_file().try_clone()?);

    for (name, value) in form.fields {
        writer.write_all(text_part(&boundary, name, value).as_bytes()).await?;
    }
    writer.write_all(file_part_header(&boundary, form).as_bytes()).await?;

    let mut reader = tokio::fs::File::open(source).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            TransferError::FileNotFound(source.display().to_string())
        } else {
            TransferError::File(file_utils::FsError::io(source.display(), e))
        }
    })?;

    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await?;
    }

    writer.write_all(format!("\r\n--{boundary}--\r\n").as_bytes()).await?;
    writer.flush().await?;
    writer.sync_all().await?;

    let len = writer.metadata().await?.len();
    debug!("staged multipart body for {source:?}: {len} bytes at {:?}", staged.path());

    Ok(StagedBody {
        file: staged,
        len,
        content_type: format!("multipart/form-data; boundary={boundary}"),
    })
}
