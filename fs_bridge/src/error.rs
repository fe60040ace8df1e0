use file_utils::FsError;
use thiserror::Error;
use tokio::task::JoinError;
use transfer_client::TransferError;

/// Errors as a host application sees them. Every variant carries a readable message.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("File error: {0}")]
    FileError(String),

    #[error("Network error: {message}")]
    NetworkError { message: String, status: Option<u16> },

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    /// Stable name of the error kind, for hosts that dispatch on it.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::Unavailable(_) => "Unavailable",
            BridgeError::FileError(_) => "FileError",
            BridgeError::NetworkError { .. } => "NetworkError",
            BridgeError::EncodingError(_) => "EncodingError",
            BridgeError::Cancelled => "Cancelled",
        }
    }

    /// The HTTP status of a failed transfer, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            BridgeError::NetworkError { status, .. } => *status,
            _ => None,
        }
    }

    fn network(e: &TransferError) -> Self {
        BridgeError::NetworkError {
            message: e.to_string(),
            status: e.status(),
        }
    }
}

impl From<FsError> for BridgeError {
    fn from(e: FsError) -> Self {
        match e {
            FsError::Unavailable(msg) => BridgeError::Unavailable(msg),
            FsError::Encoding(msg) => BridgeError::EncodingError(msg),
            other => BridgeError::FileError(other.to_string()),
        }
    }
}

impl From<TransferError> for BridgeError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Cancelled => BridgeError::Cancelled,
            TransferError::File(fs) => fs.into(),
            TransferError::FileNotFound(_) | TransferError::IOError(_) => BridgeError::FileError(e.to_string()),
            TransferError::Unavailable(msg) | TransferError::ConfigurationError(msg) => BridgeError::Unavailable(msg),
            ref other => BridgeError::network(other),
        }
    }
}

impl From<JoinError> for BridgeError {
    fn from(e: JoinError) -> Self {
        BridgeError::FileError(format!("background file operation failed: {e}"))
    }
}
