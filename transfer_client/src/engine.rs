use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use error_printer::ErrorPrinter;
use file_utils::{mime_type_for_path, persist_into_place, FileEntry};
use futures::FutureExt;
use progress_tracking::{ProgressCallback, ProgressDispatcher, StreamProgressReporter, TransferProgress};
use reqwest::Client;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::TransferConfig;
use crate::download::{fetch_to_staging, DownloadRequest, FetchedBody};
use crate::error::{Result, TransferError};
use crate::http_client::{build_http_client, header_map, parse_transfer_url};
use crate::job::{Direction, JobId, JobState, TransferHandle, TransferJob};
use crate::multipart::{stage_multipart_body, MultipartForm};
use crate::registry::JobRegistry;
use crate::upload::{send_upload, PreparedUpload, UploadRequest, UploadResponse};

pub type UploadHandle = TransferHandle<UploadResponse>;
pub type DownloadHandle = TransferHandle<FileEntry>;

type Registry<T> = Arc<JobRegistry<TransferJob<T>>>;

/// Runs uploads and downloads as independent tasks on a tokio runtime.
///
/// Every started transfer is registered under a fresh [JobId] until it completes,
/// fails or is cancelled. Progress callbacks are delivered on the engine's dispatch
/// thread, never after the transfer has left the registry.
pub struct TransferEngine {
    client: Client,
    config: TransferConfig,
    dispatcher: Arc<ProgressDispatcher>,
    uploads: Registry<UploadResponse>,
    downloads: Registry<FileEntry>,
    runtime: Handle,
}

impl TransferEngine {
    /// Creates an engine on the current tokio runtime.
    pub fn new(config: TransferConfig) -> Result<Self> {
        let runtime =
            Handle::try_current().map_err(|e| TransferError::Unavailable(format!("no tokio runtime available: {e}")))?;
        Self::with_runtime(config, runtime)
    }

    pub fn with_runtime(config: TransferConfig, runtime: Handle) -> Result<Self> {
        let client = build_http_client(&config)?;
        Self::with_client(config, client, runtime)
    }

    /// Uses a caller provided client, e.g. one with custom TLS or proxy settings.
    pub fn with_client(config: TransferConfig, client: Client, runtime: Handle) -> Result<Self> {
        let dispatcher = ProgressDispatcher::new().log_error("starting progress dispatcher")?;
        Ok(Self {
            client,
            config,
            dispatcher,
            uploads: Arc::new(JobRegistry::new()),
            downloads: Arc::new(JobRegistry::new()),
            runtime,
        })
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Validates the request, stages the multipart body and starts sending it.
    /// Returns once the upload is registered and running.
    pub async fn start_upload(
        &self,
        request: UploadRequest,
        on_progress: Option<ProgressCallback>,
    ) -> Result<UploadHandle> {
        let UploadRequest {
            source,
            url,
            method,
            field_name,
            file_name,
            mime_type,
            fields,
            headers,
        } = request;

        check_source(&source).await?;
        let url = parse_transfer_url(&url).debug_error("rejecting upload")?;
        let headers = header_map(&headers)?;

        let file_name = file_name.unwrap_or_else(|| {
            source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".to_owned())
        });
        let mime_type = mime_type.unwrap_or_else(|| mime_type_for_path(Path::new(&file_name)));
        let field_name = field_name.unwrap_or_else(|| self.config.default_field_name.clone());

        let form = MultipartForm {
            field_name: &field_name,
            file_name: &file_name,
            mime_type: &mime_type,
            fields: &fields,
        };
        let body =
            stage_multipart_body(&source, &form, &self.config.staging_dir, self.config.staging_chunk_size).await?;

        let sink = self.dispatcher.sink(on_progress, self.config.progress_interval);
        let reporter = StreamProgressReporter::new(body.len, sink.clone());
        let (job, handle) = TransferJob::new(Direction::Upload, source, sink);

        let prepared = PreparedUpload {
            url,
            method,
            file_name,
            headers,
            body,
            chunk_size: self.config.staging_chunk_size,
        };
        let transfer = send_upload(self.client.clone(), prepared, reporter);

        self.spawn_job(&self.uploads, job, transfer, |response| async move { Ok(response) });
        Ok(handle)
    }

    /// Starts an upload and waits for its outcome.
    pub async fn upload(&self, request: UploadRequest, on_progress: Option<ProgressCallback>) -> Result<UploadResponse> {
        self.start_upload(request, on_progress).await?.await
    }

    /// Starts fetching into a staging file. The destination is only replaced once the
    /// whole body has arrived.
    pub async fn start_download(
        &self,
        request: DownloadRequest,
        on_progress: Option<ProgressCallback>,
    ) -> Result<DownloadHandle> {
        let DownloadRequest {
            url,
            destination,
            headers,
        } = request;

        let url = parse_transfer_url(&url).debug_error("rejecting download")?;
        let headers = header_map(&headers)?;
        if destination.file_name().is_none() {
            return Err(TransferError::InvalidArguments(format!(
                "download destination {destination:?} does not name a file"
            )));
        }

        let sink = self.dispatcher.sink(on_progress, self.config.progress_interval);
        let (job, handle) = TransferJob::new(Direction::Download, destination.clone(), sink.clone());

        let client = self.client.clone();
        let staging_dir = self.config.staging_dir.clone();
        let transfer = async move { fetch_to_staging(client, url, headers, &staging_dir, sink).await };

        let commit = move |fetched: FetchedBody| async move {
            let FetchedBody { staged, mime_type } = fetched;
            let dest = destination.clone();
            tokio::task::spawn_blocking(move || persist_into_place(staged, &dest)).await??;

            Ok::<_, TransferError>(FileEntry {
                mime_type,
                ..FileEntry::for_path(&destination)
            })
        };

        self.spawn_job(&self.downloads, job, transfer, commit);
        Ok(handle)
    }

    /// Starts a download and waits for the stored file.
    pub async fn download(&self, request: DownloadRequest, on_progress: Option<ProgressCallback>) -> Result<FileEntry> {
        self.start_download(request, on_progress).await?.await
    }

    /// Returns true if the upload was active and is now cancelled; false for unknown,
    /// finished or already cancelled ids.
    pub fn cancel_upload(&self, job_id: JobId) -> bool {
        cancel_job(&self.uploads, job_id)
    }

    pub fn cancel_download(&self, job_id: JobId) -> bool {
        cancel_job(&self.downloads, job_id)
    }

    /// Cancels every active transfer. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let mut cancelled = 0;
        for claimed in self.uploads.drain() {
            claimed.progress().close();
            claimed.abort();
            claimed.resolve(Err(TransferError::Cancelled));
            cancelled += 1;
        }
        for claimed in self.downloads.drain() {
            claimed.progress().close();
            claimed.abort();
            claimed.resolve(Err(TransferError::Cancelled));
            cancelled += 1;
        }
        if cancelled > 0 {
            info!("cancelled {cancelled} active transfers");
        }
        cancelled
    }

    /// Latest progress of an active transfer.
    pub fn progress(&self, job_id: JobId) -> Option<TransferProgress> {
        self.uploads
            .get(job_id)
            .map(|j| j.latest_progress())
            .or_else(|| self.downloads.get(job_id).map(|j| j.latest_progress()))
    }

    /// State of an active transfer. Finished transfers are reported through their handle.
    pub fn state(&self, job_id: JobId) -> Option<JobState> {
        self.uploads
            .get(job_id)
            .map(|j| j.state())
            .or_else(|| self.downloads.get(job_id).map(|j| j.state()))
    }

    /// The transfer run by the given worker task, if it is still active.
    pub fn job_for_task(&self, task_id: tokio::task::Id) -> Option<JobId> {
        self.uploads
            .lookup_task(task_id)
            .or_else(|| self.downloads.lookup_task(task_id))
    }

    pub fn active_uploads(&self) -> usize {
        self.uploads.len()
    }

    pub fn active_downloads(&self) -> usize {
        self.downloads.len()
    }

    /// Registers the job and runs it on a new task.
    ///
    /// `transfer` runs while the job is registered and can be cancelled. Whoever
    /// removes the job from the registry first owns its outcome: if the worker wins,
    /// it runs `commit` on the transfer's output and resolves the job.
    fn spawn_job<T, P, Fut, C, CFut>(&self, registry: &Registry<T>, job: Arc<TransferJob<T>>, transfer: Fut, commit: C)
    where
        T: Send + 'static,
        P: Send + 'static,
        Fut: Future<Output = Result<P>> + Send + 'static,
        C: FnOnce(P) -> CFut + Send + 'static,
        CFut: Future<Output = Result<T>> + Send + 'static,
    {
        let job_id = job.id();
        let direction = job.direction();
        info!("{direction} {job_id} started for {:?}", job.path());

        // The worker waits for this gate, so the task binding and abort handle are in
        // place before any transfer work can happen.
        let (start_tx, start_rx) = oneshot::channel::<()>();
        if !registry.register(job_id, job.clone()) {
            // Dropping the job closes its completion channel, so the handle resolves
            // with an internal error instead of hanging.
            error!("{direction} {job_id} is already registered; not starting it");
            return;
        }

        let worker_registry = registry.clone();
        let worker = async move {
            if start_rx.await.is_err() {
                return;
            }
            let Some(job) = worker_registry.get(job_id) else {
                debug!("{direction} {job_id} was cancelled before it started");
                return;
            };
            job.mark_in_progress();

            let outcome = AssertUnwindSafe(transfer)
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(TransferError::InternalError(anyhow!("{direction} {job_id} panicked"))));

            // Deliver the final progress while the job is still registered.
            if outcome.is_ok() {
                job.progress().flush().await;
            }
            drop(job);

            let Some(claimed) = worker_registry.remove(job_id) else {
                debug!("{direction} {job_id} was cancelled; discarding its result");
                return;
            };
            claimed.progress().close();

            let result = match outcome {
                Ok(output) => commit(output).await,
                Err(e) => Err(e),
            };
            match &result {
                Ok(_) => info!("{direction} {job_id} completed"),
                Err(e) => warn!("{direction} {job_id} failed: {e}"),
            }
            claimed.resolve(result);
        };

        let task = self
            .runtime
            .spawn(worker.instrument(info_span!("transfer", %job_id, %direction)));
        registry.bind_task(job_id, task.id());
        job.set_abort_handle(task.abort_handle());
        let _ = start_tx.send(());
    }
}

impl Drop for TransferEngine {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

async fn check_source(source: &Path) -> Result<()> {
    match tokio::fs::metadata(source).await {
        Ok(m) if m.is_file() => Ok(()),
        Ok(_) => Err(TransferError::FileNotFound(format!("{} is not a regular file", source.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(TransferError::FileNotFound(source.display().to_string())),
        Err(e) => Err(file_utils::FsError::io(source.display(), e).into()),
    }
}

fn cancel_job<T>(registry: &JobRegistry<TransferJob<T>>, job_id: JobId) -> bool {
    let Some(claimed) = registry.remove(job_id) else {
        debug!("no active transfer {job_id} to cancel");
        return false;
    };

    claimed.progress().close();
    claimed.abort();
    info!("{} {job_id} cancelled", claimed.direction());
    claimed.resolve(Err(TransferError::Cancelled));
    true
}
