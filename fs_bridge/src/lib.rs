#![cfg_attr(feature = "strict", deny(warnings))]

mod bridge;
mod error;
mod handle;
pub mod logging;
mod options;

pub use bridge::FsBridge;
pub use error::{BridgeError, Result};
pub use file_utils::{ContentReference, ContentResolver, FileEncoding, FileEntry, FileStat, FileSystem, PlatformDirs};
pub use handle::{BridgeHandle, DownloadHandle, UploadHandle};
pub use options::UploadOptions;
pub use progress_tracking::{ProgressCallback, TransferProgress};
pub use transfer_client::{JobId, JobState, TransferConfig, UploadMethod, UploadResponse};
