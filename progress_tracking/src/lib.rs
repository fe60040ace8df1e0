mod dispatcher;
mod progress_info;
mod stream_progress;

pub use dispatcher::{ProgressCallback, ProgressDispatcher, ProgressSink};
pub use progress_info::TransferProgress;
pub use stream_progress::{DownloadProgressStream, StreamProgressReporter, UploadProgressStream};
