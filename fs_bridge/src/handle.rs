use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use file_utils::FileEntry;
use transfer_client::{JobId, JobState, TransferHandle, UploadResponse};

use crate::error::{BridgeError, Result};

pub type UploadHandle = BridgeHandle<UploadResponse>;
pub type DownloadHandle = BridgeHandle<FileEntry>;

/// A started upload or download. Awaiting it yields the transfer's result, with
/// failures reported as [BridgeError].
pub struct BridgeHandle<T> {
    inner: TransferHandle<T>,
}

impl<T> BridgeHandle<T> {
    pub fn job_id(&self) -> JobId {
        self.inner.job_id()
    }

    pub fn state(&self) -> JobState {
        self.inner.state()
    }
}

impl<T> From<TransferHandle<T>> for BridgeHandle<T> {
    fn from(inner: TransferHandle<T>) -> Self {
        Self { inner }
    }
}

impl<T> Future for BridgeHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx).map(|r| r.map_err(BridgeError::from))
    }
}

impl<T> fmt::Debug for BridgeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}
