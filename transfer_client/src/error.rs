use anyhow::anyhow;
use file_utils::FsError;
use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio::task::JoinError;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid Arguments: {0}")]
    InvalidArguments(String),

    #[error("Request to {url} failed with HTTP status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Network Error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Transfer cancelled")]
    Cancelled,

    #[error("File Error: {0}")]
    File(#[from] FsError),

    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration Error: {0}")]
    ConfigurationError(String),

    #[error("Other Internal Error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TransferError>;

impl TransferError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransferError::Cancelled)
    }

    /// The HTTP status code, if the server answered with a non-success status.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransferError::HttpStatus { status, .. } => Some(*status),
            TransferError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub(crate) fn invalid_url(url: &str, reason: impl ToString) -> Self {
        TransferError::InvalidUrl {
            url: url.to_owned(),
            reason: reason.to_string(),
        }
    }
}

impl PartialEq for TransferError {
    fn eq(&self, other: &TransferError) -> bool {
        match (self, other) {
            (TransferError::HttpStatus { status: a, .. }, TransferError::HttpStatus { status: b, .. }) => a == b,
            (e1, e2) => std::mem::discriminant(e1) == std::mem::discriminant(e2),
        }
    }
}

impl From<JoinError> for TransferError {
    fn from(value: JoinError) -> Self {
        TransferError::InternalError(anyhow!("{value:?}"))
    }
}

impl From<RecvError> for TransferError {
    fn from(value: RecvError) -> Self {
        TransferError::InternalError(anyhow!("transfer job dropped without a result: {value:?}"))
    }
}
