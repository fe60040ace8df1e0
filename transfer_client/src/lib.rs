#![cfg_attr(feature = "strict", deny(warnings))]

mod config;
pub mod constants;
mod download;
mod engine;
mod error;
mod http_client;
mod job;
mod multipart;
mod registry;
mod upload;

pub use config::TransferConfig;
pub use download::DownloadRequest;
pub use engine::{DownloadHandle, TransferEngine, UploadHandle};
pub use error::{Result, TransferError};
pub use http_client::{build_http_client, header_map, parse_transfer_url};
pub use job::{Direction, JobId, JobState, TransferHandle};
pub use registry::{Claimed, JobRegistry};
pub use upload::{UploadMethod, UploadRequest, UploadResponse};
