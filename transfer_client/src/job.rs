use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use progress_tracking::{ProgressSink, TransferProgress};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use ulid::Ulid;

use crate::error::{Result, TransferError};
use crate::registry::Claimed;

/// Identifies one upload or download. Ids are unique within a process and are handed
/// to callers in their string form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(Ulid);

impl JobId {
    pub(crate) fn new() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self> {
        Ulid::from_string(s.trim())
            .map(JobId)
            .map_err(|e| TransferError::InvalidArguments(format!("invalid job id {s:?}: {e}")))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Upload => "upload",
            Direction::Download => "download",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }
}

/// An active transfer as tracked by the engine.
pub(crate) struct TransferJob<T> {
    id: JobId,
    direction: Direction,
    path: PathBuf,
    state: Arc<Mutex<JobState>>,
    progress: ProgressSink,
    completion: Mutex<Option<oneshot::Sender<Result<T>>>>,
    abort_handle: Mutex<Option<AbortHandle>>,
}

impl<T> TransferJob<T> {
    pub(crate) fn new(direction: Direction, path: PathBuf, progress: ProgressSink) -> (Arc<Self>, TransferHandle<T>) {
        let id = JobId::new();
        let state = Arc::new(Mutex::new(JobState::Pending));
        let (tx, rx) = oneshot::channel();

        let job = Arc::new(Self {
            id,
            direction,
            path,
            state: state.clone(),
            progress,
            completion: Mutex::new(Some(tx)),
            abort_handle: Mutex::new(None),
        });

        let handle = TransferHandle {
            job_id: id,
            state,
            completion: rx,
        };

        (job, handle)
    }

    pub(crate) fn id(&self) -> JobId {
        self.id
    }

    pub(crate) fn direction(&self) -> Direction {
        self.direction
    }

    /// Source file for uploads, destination for downloads.
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn state(&self) -> JobState {
        *self.state.lock()
    }

    pub(crate) fn progress(&self) -> &ProgressSink {
        &self.progress
    }

    pub(crate) fn latest_progress(&self) -> TransferProgress {
        self.progress.latest()
    }

    pub(crate) fn mark_in_progress(&self) {
        let mut state = self.state.lock();
        if *state == JobState::Pending {
            *state = JobState::InProgress;
        }
    }

    pub(crate) fn set_abort_handle(&self, handle: AbortHandle) {
        *self.abort_handle.lock() = Some(handle);
    }
}

impl<T> Claimed<TransferJob<T>> {
    /// Stops the worker task, if it is still running.
    pub(crate) fn abort(&self) {
        if let Some(handle) = self.abort_handle.lock().take() {
            handle.abort();
        }
    }

    /// Delivers the final outcome. Consumes the claim, so a job resolves at most once.
    pub(crate) fn resolve(self, result: Result<T>) {
        let final_state = match &result {
            Ok(_) => JobState::Completed,
            Err(e) if e.is_cancelled() => JobState::Cancelled,
            Err(_) => JobState::Failed,
        };
        *self.state.lock() = final_state;
        self.progress.close();

        if let Some(tx) = self.completion.lock().take() {
            // The caller may have dropped its handle; the outcome is then discarded.
            let _ = tx.send(result);
        }
    }
}

/// The caller's side of a started transfer: its id, its state, and a future that
/// resolves with the outcome.
pub struct TransferHandle<T> {
    job_id: JobId,
    state: Arc<Mutex<JobState>>,
    completion: oneshot::Receiver<Result<T>>,
}

impl<T> TransferHandle<T> {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn state(&self) -> JobState {
        *self.state.lock()
    }
}

impl<T> Future for TransferHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.completion).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(e)) => Poll::Ready(Err(e.into())),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> fmt::Debug for TransferHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferHandle")
            .field("job_id", &self.job_id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_string_form() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert_ne!(JobId::new(), id);
        assert!("not-an-id".parse::<JobId>().is_err());
    }

    #[test]
    fn test_state_terminality() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::InProgress.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
    }
}
