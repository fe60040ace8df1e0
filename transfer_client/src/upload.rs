use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use progress_tracking::{StreamProgressReporter, UploadProgressStream};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, Method};
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::debug;
use url::Url;

use crate::constants::FILENAME_HEADER;
use crate::error::{Result, TransferError};
use crate::http_client::file_name_header_value;
use crate::multipart::StagedBody;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UploadMethod {
    #[default]
    Post,
    Put,
    Patch,
}

impl UploadMethod {
    fn as_method(&self) -> Method {
        match self {
            UploadMethod::Post => Method::POST,
            UploadMethod::Put => Method::PUT,
            UploadMethod::Patch => Method::PATCH,
        }
    }
}

impl FromStr for UploadMethod {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "POST" => Ok(UploadMethod::Post),
            "PUT" => Ok(UploadMethod::Put),
            "PATCH" => Ok(UploadMethod::Patch),
            other => Err(TransferError::InvalidArguments(format!("unsupported upload method {other:?}"))),
        }
    }
}

impl fmt::Display for UploadMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_method().as_str())
    }
}

/// Everything needed to upload one local file as a multipart form.
#[derive(Clone, Debug)]
pub struct UploadRequest {
    pub source: PathBuf,
    pub url: String,
    pub method: UploadMethod,
    /// Form field of the file part; the engine default when unset.
    pub field_name: Option<String>,
    /// Defaults to the source's file name.
    pub file_name: Option<String>,
    /// Defaults to a guess from the file name.
    pub mime_type: Option<String>,
    /// Extra text fields sent before the file part.
    pub fields: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl UploadRequest {
    pub fn new(source: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            url: url.into(),
            method: UploadMethod::default(),
            field_name: None,
            file_name: None,
            mime_type: None,
            fields: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn with_method(self, method: UploadMethod) -> Self {
        Self { method, ..self }
    }

    pub fn with_field_name(self, field_name: impl Into<String>) -> Self {
        Self {
            field_name: Some(field_name.into()),
            ..self
        }
    }

    pub fn with_file_name(self, file_name: impl Into<String>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            ..self
        }
    }

    pub fn with_mime_type(self, mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: Some(mime_type.into()),
            ..self
        }
    }

    pub fn with_form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UploadResponse {
    pub status: u16,
    pub body: String,
}

/// A validated upload with its body already staged.
pub(crate) struct PreparedUpload {
    pub(crate) url: Url,
    pub(crate) method: UploadMethod,
    pub(crate) file_name: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: StagedBody,
    pub(crate) chunk_size: usize,
}

/// Sends the staged body, reporting bytes as the transport consumes them.
pub(crate) async fn send_upload(
    client: Client,
    upload: PreparedUpload,
    reporter: StreamProgressReporter,
) -> Result<UploadResponse> {
    let PreparedUpload {
        url,
        method,
        file_name,
        headers,
        body,
        chunk_size,
    } = upload;

    let reader = tokio::fs::File::open(body.file.path()).await?;
    let stream = UploadProgressStream::wrap_stream(ReaderStream::with_capacity(reader, chunk_size), reporter.clone());

    let content_type = HeaderValue::from_str(&body.content_type)
        .map_err(|e| TransferError::InternalError(anyhow::anyhow!("bad multipart content type: {e}")))?;

    debug!("{method} {url}: sending {} byte multipart body", body.len);
    let response = client
        .request(method.as_method(), url.clone())
        .headers(headers)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LENGTH, body.len)
        .header(FILENAME_HEADER, file_name_header_value(&file_name))
        .body(Body::wrap_stream(stream))
        .send()
        .await?;

    // The transport stops polling the body once Content-Length bytes went out, so the
    // last chunk is only known to be sent once the response arrives.
    reporter.report_progress(body.len);

    let status = response.status();
    let response_body = response.text().await?;

    // The staged body is removed once the request is done with it.
    drop(body);

    if !status.is_success() {
        debug!("{method} {url}: server answered {status} for {file_name:?}");
        return Err(TransferError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    Ok(UploadResponse {
        status: status.as_u16(),
        body: response_body,
    })
}
