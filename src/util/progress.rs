use std::{
    fmt,
    io::{self, Read},
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};

/// Receives byte-count updates while a body is transferred.
///
/// `delta` is negative when a retry rewinds an upload that was partly sent.
pub trait ProgressWatcher: Send + Sync {
    fn bytes_transferred(&self, delta: i64);
}

/// Running total of transferred bytes.
#[derive(Debug, Default)]
pub struct ByteCounter {
    total: AtomicI64,
}

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> i64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl ProgressWatcher for ByteCounter {
    fn bytes_transferred(&self, delta: i64) {
        self.total.fetch_add(delta, Ordering::Relaxed);
    }
}

pub const DEFAULT_NOTIFY_THRESHOLD: u64 = 1024;

/// Reader that reports progress to a [`ProgressWatcher`].
///
/// Updates are batched: the watcher hears about bytes once more than the
/// threshold has accumulated, at end of stream, and when the reader is dropped.
pub struct ProgressReader<R> {
    inner: R,
    watcher: Arc<dyn ProgressWatcher>,
    threshold: u64,
    pending: u64,
    sent: Option<Arc<AtomicI64>>,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(inner: R, watcher: Arc<dyn ProgressWatcher>) -> Self {
        Self::with_threshold(inner, watcher, DEFAULT_NOTIFY_THRESHOLD)
    }

    pub fn with_threshold(inner: R, watcher: Arc<dyn ProgressWatcher>, threshold: u64) -> Self {
        Self {
            inner,
            watcher,
            threshold,
            pending: 0,
            sent: None,
        }
    }

    /// Also accumulates reported bytes into `sent`, so a later attempt can rewind them.
    pub(crate) fn tracking(mut self, sent: Arc<AtomicI64>) -> Self {
        self.sent = Some(sent);
        self
    }
}

impl<R> ProgressReader<R> {
    fn flush_pending(&mut self) {
        if self.pending == 0 {
            return;
        }
        let delta = i64::try_from(self.pending).unwrap_or(i64::MAX);
        self.pending = 0;
        if let Some(sent) = &self.sent {
            sent.fetch_add(delta, Ordering::Relaxed);
        }
        self.watcher.bytes_transferred(delta);
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 {
            self.flush_pending();
            return Ok(0);
        }
        self.pending += n as u64;
        if self.pending > self.threshold {
            self.flush_pending();
        }
        Ok(n)
    }
}

impl<R> Drop for ProgressReader<R> {
    fn drop(&mut self) {
        self.flush_pending();
    }
}

impl<R> fmt::Debug for ProgressReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReader")
            .field("threshold", &self.threshold)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}
