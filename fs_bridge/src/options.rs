use std::collections::BTreeMap;

use transfer_client::UploadMethod;

/// Host options for `upload_file`.
#[derive(Clone, Debug, Default)]
pub struct UploadOptions {
    pub url: String,
    pub method: Option<UploadMethod>,
    /// Form field name of the file part.
    pub field: Option<String>,
    /// Text fields sent with the file.
    pub fields: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
}

impl UploadOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}
