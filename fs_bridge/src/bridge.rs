use std::sync::Arc;

use error_printer::ErrorPrinter;
use file_utils::{ContentResolver, FileEncoding, FileEntry, FileStat, FileSystem, PlatformDirs, ResolvedPath};
use progress_tracking::ProgressCallback;
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, info};
use transfer_client::{DownloadRequest, JobId, TransferConfig, TransferEngine, UploadRequest};

use crate::error::{BridgeError, Result};
use crate::handle::{DownloadHandle, UploadHandle};
use crate::options::UploadOptions;

/// The host-facing surface: filesystem operations, uploads and downloads behind one
/// object with one error type.
///
/// Filesystem calls run on the runtime's blocking pool. Transfers run as tasks on
/// the same runtime; their progress callbacks run on a dedicated dispatch thread.
pub struct FsBridge {
    fs: FileSystem,
    // Declared before the runtime so active transfers are cancelled before it shuts down.
    engine: TransferEngine,
    dirs: PlatformDirs,
    handle: Handle,
    _runtime: Option<Runtime>,
}

impl FsBridge {
    /// Uses the current tokio runtime if there is one, otherwise starts and owns a
    /// multi-threaded runtime.
    pub fn new() -> Result<Self> {
        Self::with_config(TransferConfig::default(), FileSystem::new())
    }

    pub fn with_config(config: TransferConfig, fs: FileSystem) -> Result<Self> {
        let (handle, runtime) = match Handle::try_current() {
            Ok(handle) => (handle, None),
            Err(_) => {
                debug!("no tokio runtime found; starting one");
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .thread_name("fs-bridge-worker")
                    .enable_all()
                    .build()
                    .map_err(|e| BridgeError::Unavailable(format!("cannot start async runtime: {e}")))
                    .log_error("starting runtime")?;
                (runtime.handle().clone(), Some(runtime))
            },
        };

        let engine = TransferEngine::with_runtime(config, handle.clone())?;
        info!("file bridge ready");

        Ok(Self {
            fs,
            engine,
            dirs: PlatformDirs::resolve(),
            handle,
            _runtime: runtime,
        })
    }

    /// Serves `content://` references through a host provided resolver.
    pub fn with_content_resolver(mut self, resolver: Arc<dyn ContentResolver>) -> Self {
        self.fs = std::mem::take(&mut self.fs).with_content_resolver(resolver);
        self
    }

    /// The runtime transfers and file operations run on.
    pub fn runtime(&self) -> &Handle {
        &self.handle
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&FileSystem) -> file_utils::Result<T> + Send + 'static,
    {
        let fs = self.fs.clone();
        Ok(self.handle.spawn_blocking(move || op(&fs)).await??)
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        let path = path.to_owned();
        self.blocking(move |fs| Ok(fs.exists(&path))).await
    }

    pub async fn read_file(&self, path: &str, encoding: FileEncoding) -> Result<String> {
        let path = path.to_owned();
        self.blocking(move |fs| fs.read_file(&path, encoding)).await
    }

    pub async fn write_file(&self, path: &str, data: &str, encoding: FileEncoding) -> Result<()> {
        let (path, data) = (path.to_owned(), data.to_owned());
        self.blocking(move |fs| fs.write_file(&path, &data, encoding)).await
    }

    /// Copies a file or a whole directory tree.
    pub async fn copy(&self, src: &str, dest: &str) -> Result<()> {
        let (src, dest) = (src.to_owned(), dest.to_owned());
        self.blocking(move |fs| fs.copy(&src, &dest)).await
    }

    pub async fn copy_file(&self, src: &str, dest: &str) -> Result<()> {
        let (src, dest) = (src.to_owned(), dest.to_owned());
        self.blocking(move |fs| fs.copy_file(&src, &dest)).await
    }

    /// Returns false if nothing existed at `path`.
    pub async fn unlink(&self, path: &str) -> Result<bool> {
        let path = path.to_owned();
        self.blocking(move |fs| fs.unlink(&path)).await
    }

    pub async fn mkdir(&self, path: &str) -> Result<bool> {
        let path = path.to_owned();
        self.blocking(move |fs| fs.mkdir(&path)).await
    }

    pub async fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        let (old_path, new_path) = (old_path.to_owned(), new_path.to_owned());
        self.blocking(move |fs| fs.rename(&old_path, &new_path)).await
    }

    pub async fn stat(&self, path: &str) -> Result<FileStat> {
        let path = path.to_owned();
        self.blocking(move |fs| fs.stat(&path)).await
    }

    pub async fn readdir(&self, path: &str) -> Result<Vec<FileEntry>> {
        let path = path.to_owned();
        self.blocking(move |fs| fs.readdir(&path)).await
    }

    pub fn dirname(&self, path: &str) -> Result<String> {
        Ok(self.fs.dirname(path)?)
    }

    pub fn basename(&self, path: &str) -> Result<String> {
        Ok(self.fs.basename(path)?)
    }

    /// The extension without its dot.
    pub fn extname(&self, path: &str) -> Result<String> {
        Ok(self.fs.extname(path)?)
    }

    /// Describes a file for `upload_file`: its name, guessed content type and path.
    pub fn file_entry(&self, path: &str) -> Result<FileEntry> {
        Ok(self.fs.file_entry(path)?)
    }

    /// Well-known platform directories; empty strings where the platform has none.
    pub fn dirs(&self) -> &PlatformDirs {
        &self.dirs
    }

    /// Starts uploading a local file. The returned handle carries the job id and
    /// resolves with the server's response.
    pub async fn upload_file(
        &self,
        file: &FileEntry,
        options: UploadOptions,
        on_progress: Option<ProgressCallback>,
    ) -> Result<UploadHandle> {
        let source = ResolvedPath::parse(&file.path)?.require_local("upload")?.to_path_buf();

        let mut request = UploadRequest::new(source, options.url);
        if let Some(method) = options.method {
            request = request.with_method(method);
        }
        if let Some(field) = options.field {
            request = request.with_field_name(field);
        }
        if !file.name.is_empty() {
            request = request.with_file_name(&file.name);
        }
        if !file.mime_type.is_empty() {
            request = request.with_mime_type(&file.mime_type);
        }
        request.fields.extend(options.fields);
        request.headers.extend(options.headers);

        Ok(self.engine.start_upload(request, on_progress).await?.into())
    }

    /// Cancels an upload by its string id. Unknown, finished or malformed ids yield false.
    pub fn cancel_upload(&self, job_id: &str) -> bool {
        job_id.parse::<JobId>().is_ok_and(|id| self.engine.cancel_upload(id))
    }

    /// Starts downloading `url` to `destination_path`. The returned handle carries
    /// the job id and resolves with the stored file.
    pub async fn download_file(
        &self,
        url: &str,
        destination_path: &str,
        on_progress: Option<ProgressCallback>,
    ) -> Result<DownloadHandle> {
        self.download_file_with_headers(url, destination_path, [], on_progress).await
    }

    /// Like [FsBridge::download_file] with extra request headers.
    pub async fn download_file_with_headers(
        &self,
        url: &str,
        destination_path: &str,
        headers: impl IntoIterator<Item = (String, String)>,
        on_progress: Option<ProgressCallback>,
    ) -> Result<DownloadHandle> {
        let destination = ResolvedPath::parse(destination_path)?
            .require_local("download")?
            .to_path_buf();
        let mut request = DownloadRequest::new(url, destination);
        request.headers.extend(headers);
        Ok(self.engine.start_download(request, on_progress).await?.into())
    }

    pub fn cancel_download(&self, job_id: &str) -> bool {
        job_id.parse::<JobId>().is_ok_and(|id| self.engine.cancel_download(id))
    }

    pub fn engine(&self) -> &TransferEngine {
        &self.engine
    }
}
