use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use error_printer::ErrorPrinter;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::TransferProgress;

/// Progress callback receiving (bytes_transferred, total_bytes).
///
/// Callbacks are only ever invoked on the dispatcher thread, one at a time, so they
/// may capture non-thread-safe state as long as it is `Send`.
pub type ProgressCallback = Box<dyn FnMut(u64, u64) + Send + 'static>;

const DISPATCH_THREAD_NAME: &str = "progress-dispatch";

thread_local! {
    // Address of the sink whose callback is currently running on this thread, or 0.
    static RUNNING_SINK: Cell<usize> = const { Cell::new(0) };
}

enum DispatchMessage {
    Deliver(Arc<SinkShared>),
    Flush(oneshot::Sender<()>),
}

/// Owns the single callback context on which all progress callbacks run.
///
/// Transfers report into a [ProgressSink]; the sink records the latest value and
/// queues at most one pending delivery, so a slow callback never blocks the
/// transfer and the queue never grows beyond the number of active sinks.
pub struct ProgressDispatcher {
    sender: mpsc::UnboundedSender<DispatchMessage>,
}

impl ProgressDispatcher {
    /// Starts the dispatcher thread. The thread exits once the dispatcher and every
    /// sink created from it have been dropped.
    pub fn new() -> std::io::Result<Arc<Self>> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<DispatchMessage>();

        std::thread::Builder::new()
            .name(DISPATCH_THREAD_NAME.to_owned())
            .spawn(move || {
                debug!("progress dispatcher started");
                while let Some(message) = receiver.blocking_recv() {
                    match message {
                        DispatchMessage::Deliver(shared) => shared.deliver(),
                        DispatchMessage::Flush(ack) => {
                            let _ = ack.send(());
                        },
                    }
                }
                debug!("progress dispatcher stopped");
            })?;

        Ok(Arc::new(Self { sender }))
    }

    /// Creates the progress sink for one transfer. Updates closer together than
    /// `min_interval` are coalesced, except the one that completes the transfer.
    pub fn sink(&self, callback: Option<ProgressCallback>, min_interval: Duration) -> ProgressSink {
        ProgressSink {
            shared: Arc::new(SinkShared {
                callback: Mutex::new(CallbackSlot {
                    callback,
                    delivered: 0,
                }),
                latest: Mutex::new(LatestProgress {
                    progress: TransferProgress::default(),
                    last_forwarded: None,
                }),
                closed: AtomicBool::new(false),
                queued: AtomicBool::new(false),
                min_interval,
                sender: self.sender.clone(),
            }),
        }
    }
}

struct CallbackSlot {
    callback: Option<ProgressCallback>,
    delivered: u64,
}

struct LatestProgress {
    progress: TransferProgress,
    last_forwarded: Option<Instant>,
}

struct SinkShared {
    callback: Mutex<CallbackSlot>,
    latest: Mutex<LatestProgress>,
    closed: AtomicBool,
    queued: AtomicBool,
    min_interval: Duration,
    sender: mpsc::UnboundedSender<DispatchMessage>,
}

impl SinkShared {
    fn id(self: &Arc<Self>) -> usize {
        Arc::as_ptr(self) as usize
    }

    fn schedule(self: &Arc<Self>) {
        if self.queued.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.sender.send(DispatchMessage::Deliver(self.clone())).is_err() {
            self.queued.store(false, Ordering::Release);
        }
    }

    // Runs on the dispatcher thread only.
    fn deliver(self: &Arc<Self>) {
        self.queued.store(false, Ordering::Release);

        let mut slot = self.callback.lock();
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        let progress = self.latest.lock().progress;
        if progress.bytes_transferred <= slot.delivered {
            return;
        }
        slot.delivered = progress.bytes_transferred;

        let Some(callback) = slot.callback.as_mut() else {
            return;
        };

        RUNNING_SINK.with(|s| s.set(self.id()));
        let result = catch_unwind(AssertUnwindSafe(|| callback(progress.bytes_transferred, progress.total_bytes)));
        RUNNING_SINK.with(|s| s.set(0));

        if result.is_err() {
            error!("progress callback panicked; further progress for this transfer is dropped");
            slot.callback = None;
        }
    }
}

/// The per-transfer handle used to report progress and to shut off callbacks.
#[derive(Clone)]
pub struct ProgressSink {
    shared: Arc<SinkShared>,
}

impl ProgressSink {
    /// Records that `completed` of `total` bytes have been transferred.
    ///
    /// Reports with an unknown total (0) are ignored, as are reports that do not
    /// move progress forward or arrive after [ProgressSink::close].
    pub fn report(&self, completed: u64, total: u64) {
        if total == 0 || self.shared.closed.load(Ordering::Acquire) {
            return;
        }

        let forward = {
            let mut latest = self.shared.latest.lock();
            if completed <= latest.progress.bytes_transferred {
                return;
            }
            latest.progress = TransferProgress::new(completed, total);

            let now = Instant::now();
            let due = latest
                .last_forwarded
                .is_none_or(|t| now.duration_since(t) >= self.shared.min_interval);
            if due || completed >= total {
                latest.last_forwarded = Some(now);
                true
            } else {
                false
            }
        };

        if forward {
            self.shared.schedule();
        }
    }

    /// The latest reported progress, whether or not it has been delivered yet.
    pub fn latest(&self) -> TransferProgress {
        self.shared.latest.lock().progress
    }

    /// Waits until every value reported so far has been handed to the callback,
    /// including values held back by the rate limit.
    pub async fn flush(&self) {
        if self.shared.closed.load(Ordering::Acquire) {
            return;
        }
        self.shared.schedule();

        let (ack, done) = oneshot::channel();
        if self.shared.sender.send(DispatchMessage::Flush(ack)).is_ok() {
            let _ = done.await.debug_error("progress dispatcher went away during flush");
        }
    }

    /// Stops all further callbacks. Once this returns, the callback is not running
    /// and will never be invoked again.
    ///
    /// Calling this from inside the sink's own callback is allowed; the callback
    /// completes and is not invoked again.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);

        if RUNNING_SINK.with(|s| s.get()) == self.shared.id() {
            return;
        }

        // Waits out an in-flight invocation on the dispatcher thread.
        let mut slot = self.shared.callback.lock();
        slot.callback = None;
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc as std_mpsc;

    use more_asserts::assert_le;

    use super::*;

    fn channel_callback() -> (ProgressCallback, std_mpsc::Receiver<(u64, u64, Option<String>)>) {
        let (tx, rx) = std_mpsc::channel();
        let cb = move |completed: u64, total: u64| {
            let name = std::thread::current().name().map(str::to_owned);
            let _ = tx.send((completed, total, name));
        };
        (Box::new(cb), rx)
    }

    #[tokio::test]
    async fn test_delivers_on_dispatch_thread() {
        let dispatcher = ProgressDispatcher::new().unwrap();
        let (cb, rx) = channel_callback();
        let sink = dispatcher.sink(Some(cb), Duration::ZERO);

        sink.report(10, 100);
        sink.flush().await;

        let (completed, total, thread) = rx.try_recv().unwrap();
        assert_eq!((completed, total), (10, 100));
        assert_eq!(thread.as_deref(), Some(DISPATCH_THREAD_NAME));
        assert_eq!(sink.latest(), TransferProgress::new(10, 100));
    }

    #[tokio::test]
    async fn test_unknown_total_is_suppressed() {
        let dispatcher = ProgressDispatcher::new().unwrap();
        let (cb, rx) = channel_callback();
        let sink = dispatcher.sink(Some(cb), Duration::ZERO);

        sink.report(5, 0);
        sink.report(50, 0);
        sink.flush().await;

        assert!(rx.try_recv().is_err());
        assert_eq!(sink.latest(), TransferProgress::default());
    }

    #[tokio::test]
    async fn test_deliveries_strictly_increase() {
        let dispatcher = ProgressDispatcher::new().unwrap();
        let (cb, rx) = channel_callback();
        let sink = dispatcher.sink(Some(cb), Duration::ZERO);

        for completed in [10, 5, 10, 20, 15, 40] {
            sink.report(completed, 40);
        }
        sink.flush().await;

        let delivered: Vec<u64> = rx.try_iter().map(|(c, _, _)| c).collect();
        assert!(!delivered.is_empty());
        assert!(delivered.windows(2).all(|w| w[0] < w[1]), "{delivered:?}");
        assert_eq!(delivered.last(), Some(&40));
    }

    #[tokio::test]
    async fn test_rate_limit_coalesces_but_flush_delivers_latest() {
        let dispatcher = ProgressDispatcher::new().unwrap();
        let (cb, rx) = channel_callback();
        let sink = dispatcher.sink(Some(cb), Duration::from_secs(3600));

        sink.report(1, 10);
        sink.report(2, 10);
        sink.report(3, 10);
        sink.flush().await;

        let delivered: Vec<u64> = rx.try_iter().map(|(c, _, _)| c).collect();
        assert_le!(delivered.len(), 2);
        assert_eq!(delivered.last(), Some(&3));

        // Completion is never held back by the rate limit.
        sink.report(10, 10);
        sink.flush().await;
        assert_eq!(rx.try_recv().unwrap().0, 10);
    }

    #[tokio::test]
    async fn test_no_delivery_after_close() {
        let dispatcher = ProgressDispatcher::new().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let cb = {
            let count = count.clone();
            move |_: u64, _: u64| {
                count.fetch_add(1, Ordering::SeqCst);
            }
        };
        let sink = dispatcher.sink(Some(Box::new(cb)), Duration::ZERO);

        for i in 1..=100 {
            sink.report(i, 1000);
        }
        sink.close();
        let seen = count.load(Ordering::SeqCst);

        for i in 101..=1000 {
            sink.report(i, 1000);
        }
        sink.flush().await;

        // A second sink's flush proves the dispatcher drained everything queued earlier.
        let other = dispatcher.sink(None, Duration::ZERO);
        other.report(1, 1);
        other.flush().await;

        assert!(sink.is_closed());
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_close_from_inside_callback() {
        let dispatcher = ProgressDispatcher::new().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<ProgressSink>>> = Arc::new(Mutex::new(None));

        let cb = {
            let count = count.clone();
            let slot = slot.clone();
            move |_: u64, _: u64| {
                count.fetch_add(1, Ordering::SeqCst);
                if let Some(sink) = slot.lock().as_ref() {
                    sink.close();
                }
            }
        };
        let sink = dispatcher.sink(Some(Box::new(cb)), Duration::ZERO);
        *slot.lock() = Some(sink.clone());

        sink.report(1, 10);
        let other = dispatcher.sink(None, Duration::ZERO);
        other.report(1, 1);
        other.flush().await;

        sink.report(2, 10);
        other.report(2, 2);
        other.flush().await;

        assert!(sink.is_closed());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        slot.lock().take();
    }

    #[tokio::test]
    async fn test_panicking_callback_does_not_stop_dispatcher() {
        let dispatcher = ProgressDispatcher::new().unwrap();
        let bad = dispatcher.sink(Some(Box::new(|_, _| panic!("callback failure"))), Duration::ZERO);
        bad.report(1, 2);
        bad.flush().await;

        let (cb, rx) = channel_callback();
        let good = dispatcher.sink(Some(cb), Duration::ZERO);
        good.report(3, 4);
        good.flush().await;
        assert_eq!(rx.try_recv().unwrap().0, 3);
    }
}
