use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

use crate::ProgressSink;

/// Helper for progress reporting over a byte stream. Progress is only reported for
/// bytes beyond the previous high-water mark, so a stream that is recreated for the
/// same transfer never double-counts.
#[derive(Clone)]
pub struct StreamProgressReporter {
    /// Total size in bytes, or 0 when unknown.
    total_if_known: u64,
    bytes_reported: Arc<AtomicU64>,
    sink: ProgressSink,
}

impl StreamProgressReporter {
    pub fn new(total_if_known: u64, sink: ProgressSink) -> Self {
        Self {
            total_if_known,
            bytes_reported: Arc::new(AtomicU64::new(0)),
            sink,
        }
    }

    /// Reports progress only if `new_completed` exceeds the previous high-water mark.
    pub fn report_progress(&self, new_completed: u64) {
        let old_completed = self.bytes_reported.fetch_max(new_completed, Ordering::Relaxed);

        if old_completed >= new_completed {
            return;
        }

        self.sink.report(new_completed, self.total_if_known);
    }

    pub fn bytes_reported(&self) -> u64 {
        self.bytes_reported.load(Ordering::Relaxed)
    }
}

/// Wraps an outgoing body stream. A chunk counts as sent once the transport asks for
/// the next one, and the whole body counts as sent when the inner stream ends.
pub struct UploadProgressStream<S> {
    inner: Pin<Box<S>>,
    bytes_sent: u64,
    bytes_handed_out: u64,
    reporter: StreamProgressReporter,
}

impl<S> UploadProgressStream<S>
where
    S: Stream<Item = std::io::Result<Bytes>>,
{
    pub fn wrap_stream(stream: S, reporter: StreamProgressReporter) -> Self {
        Self {
            inner: Box::pin(stream),
            bytes_sent: 0,
            bytes_handed_out: 0,
            reporter,
        }
    }
}

impl<S> Stream for UploadProgressStream<S>
where
    S: Stream<Item = std::io::Result<Bytes>>,
{
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let self_ = self.as_mut().get_mut();

        if self_.bytes_handed_out > self_.bytes_sent {
            self_.bytes_sent = self_.bytes_handed_out;
            self_.reporter.report_progress(self_.bytes_sent);
        }

        match self_.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                self_.bytes_handed_out += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            },
            other => other,
        }
    }
}

/// Wraps a download stream and reports the cumulative bytes received.
pub struct DownloadProgressStream<S> {
    inner: Pin<Box<S>>,
    bytes_received: u64,
    reporter: StreamProgressReporter,
}

impl<S, B, E> DownloadProgressStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    pub fn wrap_stream(stream: S, reporter: StreamProgressReporter) -> Self {
        Self {
            inner: Box::pin(stream),
            bytes_received: 0,
            reporter,
        }
    }
}

impl<S, B, E> Stream for DownloadProgressStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    type Item = Result<B, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(b))) => {
                let len = b.as_ref().len() as u64;
                let self_ = self.get_mut();
                self_.bytes_received += len;
                self_.reporter.report_progress(self_.bytes_received);
                Poll::Ready(Some(Ok(b)))
            },
            other => other,
        }
    }
}
